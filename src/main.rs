//! Personal trading journal CLI.
//!
//! Records trade ideas, entries, and closes for stocks and options, tracks
//! the account balance, follows named traders whose ideas can be copied
//! into the owner's own book, and derives P&L and win/loss statistics.

mod db;
mod journal;
mod metrics;
mod models;

use anyhow::{bail, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::db::{Database, TradeFilter};
use crate::journal::{enter_trade, ledger, lifecycle, TradeDraft};
use crate::metrics::{ScopeStats, StatsCalculator};
use crate::models::{
    Direction, InstrumentType, OptionType, Trade, TradeStatus, TradingStyle,
};

/// Trading journal CLI.
#[derive(Parser)]
#[command(name = "tradelog")]
#[command(about = "Personal trading journal for stocks and options", long_about = None)]
struct Cli {
    /// Database file path
    #[arg(
        short,
        long,
        default_value = "sqlite:./journal.db?mode=rwc",
        env = "TRADE_JOURNAL_DB"
    )]
    database: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a new trade or idea
    Add {
        /// Ticker symbol
        ticker: String,

        /// Entry price per unit
        #[arg(short, long)]
        entry_price: Decimal,

        /// Trading style (swing, daytrading)
        #[arg(short, long, default_value = "swing")]
        style: TradingStyle,

        /// Instrument (stock, option)
        #[arg(short, long, default_value = "stock")]
        instrument: InstrumentType,

        /// Direction (long, short)
        #[arg(short, long, default_value = "long")]
        direction: Direction,

        /// Exit price; supplying one logs the trade already closed
        #[arg(short = 'x', long)]
        exit_price: Option<Decimal>,

        /// Number of shares or contracts
        #[arg(short, long, default_value = "1")]
        quantity: i64,

        /// Total fees
        #[arg(long, default_value = "0")]
        fees: Decimal,

        /// Option contract type (call, put)
        #[arg(long)]
        option_type: Option<OptionType>,

        /// Option expiration date, free-form
        #[arg(long)]
        expiration: Option<String>,

        /// Option strike
        #[arg(long)]
        strike: Option<Decimal>,

        /// Advisory stop loss
        #[arg(long)]
        sl: Option<Decimal>,

        /// Advisory take profit
        #[arg(long)]
        tp: Option<Decimal>,

        /// Owning trader id; omit for your own book
        #[arg(short, long)]
        trader: Option<i64>,

        /// Mark capital as committed from the start
        #[arg(long)]
        entered: bool,

        /// Free-text notes
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// List trades, newest first
    List {
        /// Filter by status (idea, entered, closed)
        #[arg(short, long)]
        status: Option<TradeStatus>,

        /// Filter by ticker substring
        #[arg(long)]
        ticker: Option<String>,

        /// Filter by owning trader id
        #[arg(long)]
        trader: Option<i64>,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Update a trade; omitted fields keep their current values
    Update {
        id: i64,

        #[arg(long)]
        status: Option<TradeStatus>,

        #[arg(long)]
        style: Option<TradingStyle>,

        #[arg(long)]
        instrument: Option<InstrumentType>,

        #[arg(long)]
        ticker: Option<String>,

        #[arg(long)]
        direction: Option<Direction>,

        #[arg(long)]
        entry_price: Option<Decimal>,

        #[arg(long)]
        exit_price: Option<Decimal>,

        /// Remove the exit price, reopening the trade
        #[arg(long, conflicts_with = "exit_price")]
        clear_exit: bool,

        #[arg(long)]
        quantity: Option<i64>,

        #[arg(long)]
        fees: Option<Decimal>,

        #[arg(long)]
        option_type: Option<OptionType>,

        #[arg(long)]
        expiration: Option<String>,

        #[arg(long)]
        strike: Option<Decimal>,

        #[arg(long)]
        sl: Option<Decimal>,

        #[arg(long)]
        tp: Option<Decimal>,

        #[arg(long)]
        trader: Option<i64>,

        /// Unassign from any trader
        #[arg(long, conflicts_with = "trader")]
        clear_trader: bool,

        /// true or false
        #[arg(long)]
        entered: Option<bool>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Quick-close a trade at an exit price
    Close {
        id: i64,

        /// Exit price per unit
        exit_price: Decimal,
    },

    /// Commit capital to a trade. Entering a trader's idea copies it into
    /// your own book instead of mutating the idea.
    Enter { id: i64 },

    /// Back out of a trade; a previously propagated copy is untouched
    Unenter { id: i64 },

    /// Delete a trade
    Delete { id: i64 },

    /// Manage followed traders
    Trader {
        #[command(subcommand)]
        action: TraderCommands,
    },

    /// Show the account ledger
    Account {
        #[command(subcommand)]
        action: Option<AccountCommands>,
    },

    /// Show trading statistics
    Stats {
        /// Emit JSON instead of the report
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum TraderCommands {
    /// Add a trader to follow
    Add { name: String },

    /// List traders
    List,

    /// Remove a trader; their trades stay, unassigned
    Remove { id: i64 },
}

#[derive(Subcommand)]
enum AccountCommands {
    /// Overwrite the baseline balance
    SetBalance { balance: Decimal },

    /// Set advisory default stop-loss / take-profit levels
    SetLimits {
        #[arg(long)]
        sl: Option<Decimal>,

        #[arg(long)]
        tp: Option<Decimal>,
    },
}

/// Trade as emitted by `list --json`, with its derived P&L attached.
#[derive(Serialize)]
struct TradeWithPnl<'a> {
    #[serde(flatten)]
    trade: &'a Trade,
    pnl: Option<Decimal>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let db = Database::new(&cli.database).await?;

    match cli.command {
        Commands::Add {
            ticker,
            entry_price,
            style,
            instrument,
            direction,
            exit_price,
            quantity,
            fees,
            option_type,
            expiration,
            strike,
            sl,
            tp,
            trader,
            entered,
            notes,
        } => {
            if let Some(trader_id) = trader {
                let traders = db.list_traders().await?;
                if !traders.iter().any(|t| t.id == trader_id) {
                    bail!("trader {trader_id} not found");
                }
            }

            let draft = TradeDraft {
                status: TradeStatus::Idea,
                trading_style: style,
                instrument_type: instrument,
                ticker,
                direction,
                option_type,
                expiration_date: expiration,
                strike,
                entry_price,
                exit_price,
                quantity,
                fees,
                sl,
                tp,
                entered,
                trader_id: trader,
                notes,
                closed_at: None,
            };

            let mut trade = lifecycle::normalize_new(draft, Utc::now())?;
            trade.id = db.insert_trade(&trade).await?;

            info!(id = trade.id, ticker = %trade.ticker, "Trade logged");
            println!(
                "Logged trade #{}: {} {} {} x{} @ {} [{}]",
                trade.id,
                trade.direction.as_str(),
                trade.instrument_type.as_str(),
                trade.ticker,
                trade.quantity,
                trade.entry_price,
                trade.status.as_str()
            );
            if let Some(pnl) = trade.pnl() {
                println!("P&L: ${pnl:.2}");
            }
        }

        Commands::List {
            status,
            ticker,
            trader,
            json,
        } => {
            let filter = TradeFilter {
                status,
                ticker,
                trader_id: trader,
            };
            let trades = db.list_trades(&filter).await?;

            if json {
                let with_pnl: Vec<TradeWithPnl> = trades
                    .iter()
                    .map(|trade| TradeWithPnl {
                        trade,
                        pnl: trade.pnl(),
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&with_pnl)?);
                return Ok(());
            }

            if trades.is_empty() {
                println!("No trades recorded. Use 'tradelog add <ticker> -e <price>' to log one.");
                return Ok(());
            }

            println!(
                "\n{:>4} {:<8} {:<6} {:<5} {:>4} {:>10} {:>10} {:>11} {:<8} {:<5} {}",
                "ID", "TICKER", "TYPE", "DIR", "QTY", "ENTRY", "EXIT", "P&L", "STATUS", "FLAGS", "NOTES"
            );
            println!("{}", "-".repeat(100));

            let mut total_pnl = Decimal::ZERO;
            for trade in &trades {
                let pnl = trade.pnl();
                if let Some(p) = pnl {
                    total_pnl += p;
                }
                println!(
                    "{:>4} {:<8} {:<6} {:<5} {:>4} {:>10} {:>10} {:>11} {:<8} {:<5} {}",
                    trade.id,
                    truncate(&trade.ticker, 8),
                    trade.instrument_type.as_str(),
                    trade.direction.as_str(),
                    trade.quantity,
                    format!("{:.2}", trade.entry_price),
                    fmt_opt_price(trade.exit_price),
                    fmt_opt_price(pnl),
                    trade.status.as_str(),
                    trade_flags(trade),
                    truncate(trade.notes.as_deref().unwrap_or(""), 28),
                );
            }

            println!("{}", "-".repeat(100));
            println!("Listed P&L: ${total_pnl:.2}");
        }

        Commands::Update {
            id,
            status,
            style,
            instrument,
            ticker,
            direction,
            entry_price,
            exit_price,
            clear_exit,
            quantity,
            fees,
            option_type,
            expiration,
            strike,
            sl,
            tp,
            trader,
            clear_trader,
            entered,
            notes,
        } => {
            let Some(mut trade) = db.get_trade(id).await? else {
                bail!("trade {id} not found");
            };

            let mut draft = TradeDraft::from_trade(&trade);
            if let Some(v) = status {
                draft.status = v;
            }
            if let Some(v) = style {
                draft.trading_style = v;
            }
            if let Some(v) = instrument {
                draft.instrument_type = v;
            }
            if let Some(v) = ticker {
                draft.ticker = v;
            }
            if let Some(v) = direction {
                draft.direction = v;
            }
            if let Some(v) = entry_price {
                draft.entry_price = v;
            }
            if clear_exit {
                draft.exit_price = None;
            } else if let Some(v) = exit_price {
                draft.exit_price = Some(v);
            }
            if let Some(v) = quantity {
                draft.quantity = v;
            }
            if let Some(v) = fees {
                draft.fees = v;
            }
            if let Some(v) = option_type {
                draft.option_type = Some(v);
            }
            if let Some(v) = expiration {
                draft.expiration_date = Some(v);
            }
            if let Some(v) = strike {
                draft.strike = Some(v);
            }
            if let Some(v) = sl {
                draft.sl = Some(v);
            }
            if let Some(v) = tp {
                draft.tp = Some(v);
            }
            if clear_trader {
                draft.trader_id = None;
            } else if let Some(v) = trader {
                draft.trader_id = Some(v);
            }
            if let Some(v) = entered {
                draft.entered = v;
            }
            if let Some(v) = notes {
                draft.notes = Some(v);
            }

            lifecycle::apply_update(&mut trade, draft, Utc::now())?;
            db.update_trade(&trade).await?;

            info!(id = trade.id, status = trade.status.as_str(), "Trade updated");
            println!(
                "Updated trade #{}: {} [{}]{}",
                trade.id,
                trade.ticker,
                trade.status.as_str(),
                trade
                    .pnl()
                    .map(|p| format!(" P&L ${p:.2}"))
                    .unwrap_or_default()
            );
        }

        Commands::Close { id, exit_price } => {
            let Some(mut trade) = db.get_trade(id).await? else {
                bail!("trade {id} not found");
            };

            lifecycle::close(&mut trade, exit_price, Utc::now());
            db.update_trade(&trade).await?;

            info!(id = trade.id, exit = %exit_price, "Trade closed");
            match trade.pnl() {
                Some(pnl) => println!("Closed trade #{} @ {exit_price} (P&L ${pnl:.2})", trade.id),
                None => println!("Closed trade #{} @ {exit_price}", trade.id),
            }
        }

        Commands::Enter { id } => {
            let Some(trade) = db.get_trade(id).await? else {
                bail!("trade {id} not found");
            };

            let all_trades = db.all_trades().await?;
            let outcome = enter_trade(trade, &all_trades, Utc::now());

            db.update_trade(&outcome.source).await?;

            match outcome.copy {
                Some(copy) => {
                    let copy_id = db.insert_trade(&copy).await?;
                    println!(
                        "Entered trader idea #{}; copied into your book as trade #{copy_id}",
                        outcome.source.id
                    );
                }
                None if outcome.source.trader_id.is_some() => {
                    println!(
                        "Entered trader idea #{} (copy already exists)",
                        outcome.source.id
                    );
                }
                None => {
                    println!(
                        "Entered trade #{} [{}]",
                        outcome.source.id,
                        outcome.source.status.as_str()
                    );
                }
            }
        }

        Commands::Unenter { id } => {
            let Some(mut trade) = db.get_trade(id).await? else {
                bail!("trade {id} not found");
            };

            lifecycle::unenter(&mut trade);
            db.update_trade(&trade).await?;

            println!(
                "Backed out of trade #{} [{}]",
                trade.id,
                trade.status.as_str()
            );
        }

        Commands::Delete { id } => {
            if !db.delete_trade(id).await? {
                bail!("trade {id} not found");
            }
            println!("Deleted trade #{id}");
        }

        Commands::Trader { action } => match action {
            TraderCommands::Add { name } => {
                let trader = db.create_trader(&name).await?;
                println!("Added trader #{}: {}", trader.id, trader.name);
            }

            TraderCommands::List => {
                let traders = db.list_traders().await?;
                if traders.is_empty() {
                    println!("No traders yet. Use 'tradelog trader add <name>' to follow one.");
                    return Ok(());
                }

                println!("\n{:>4} {:<20} {}", "ID", "NAME", "SINCE");
                println!("{}", "-".repeat(46));
                for trader in traders {
                    println!(
                        "{:>4} {:<20} {}",
                        trader.id,
                        truncate(&trader.name, 20),
                        trader.created_at.format("%Y-%m-%d")
                    );
                }
            }

            TraderCommands::Remove { id } => {
                if !db.delete_trader(id).await? {
                    bail!("trader {id} not found");
                }
                println!("Removed trader #{id}; their trades are now unassigned");
            }
        },

        Commands::Account { action } => match action {
            None => {
                let account = db.get_or_create_account().await?;
                let trades = db.all_trades().await?;

                let realized = ledger::realized_pnl(&trades);
                let equity = ledger::equity(&account, &trades);

                println!("\n=== Account ===");
                println!("Balance:       ${:.2}", account.balance);
                println!("Realized P&L:  ${realized:.2}");
                println!("Equity:        ${equity:.2}");
                println!("Default SL:    {}", fmt_opt_price(account.global_sl));
                println!("Default TP:    {}", fmt_opt_price(account.global_tp));
                println!("Updated:       {}", account.updated_at.format("%Y-%m-%d %H:%M"));
            }

            Some(AccountCommands::SetBalance { balance }) => {
                let account = db.update_balance(balance).await?;
                info!(balance = %account.balance, "Balance updated");
                println!("Balance set to ${:.2}", account.balance);
            }

            Some(AccountCommands::SetLimits { sl, tp }) => {
                let account = db.update_limits(sl, tp).await?;
                println!(
                    "Default SL: {} / Default TP: {}",
                    fmt_opt_price(account.global_sl),
                    fmt_opt_price(account.global_tp)
                );
            }
        },

        Commands::Stats { json } => {
            let trades = db.all_trades().await?;
            let traders = db.list_traders().await?;
            let account = db.get_or_create_account().await?;

            let report = StatsCalculator::calculate(&trades, &traders, &account);

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            println!("\n=== Trading Statistics ===");
            print_scope("Overall", &report.overall);
            println!("Max Drawdown:   ${:.2}", report.max_drawdown);

            print_scope("Stocks", &report.stock);
            print_scope("Options", &report.option);

            println!("\n--- Portfolio ---");
            println!(
                "{:<20} {:>12} {:>12} {:>7}",
                "SCOPE", "P&L", "EQUITY", "TRADES"
            );
            println!("{}", "-".repeat(54));
            for entry in &report.portfolio {
                println!(
                    "{:<20} {:>12} {:>12} {:>7}",
                    truncate(&entry.label, 20),
                    format!("{:.2}", entry.pnl),
                    format!("{:.2}", entry.equity),
                    entry.trades
                );
            }
        }
    }

    Ok(())
}

fn print_scope(label: &str, stats: &ScopeStats) {
    println!("\n--- {label} ---");
    println!("Total Trades:   {}", stats.total_trades);
    println!(
        "Closed:         {} ({} open)",
        stats.closed_trades, stats.open_trades
    );
    println!("Total P&L:      ${:.2}", stats.total_pnl);
    println!("Winning Trades: {}", stats.winning_trades);
    println!("Losing Trades:  {}", stats.losing_trades);
    println!("Win Rate:       {:.2}%", stats.win_rate);
    println!("Avg Win:        ${:.2}", stats.avg_win);
    println!("Avg Loss:       ${:.2}", stats.avg_loss);
    println!("Profit Factor:  {:.2}", stats.profit_factor);
    println!("Expectancy:     ${:.2}", stats.expectancy);
}

/// Single-letter markers for the list view: entered, source, copy.
fn trade_flags(trade: &Trade) -> String {
    let mut flags = String::new();
    if trade.entered {
        flags.push('E');
    }
    if trade.is_source_trade() {
        flags.push('S');
    }
    if trade.is_copy_trade() {
        flags.push('C');
    }
    flags
}

fn fmt_opt_price(value: Option<Decimal>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => "-".to_string(),
    }
}

/// Truncate a string with ellipsis if too long.
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len - 3])
    }
}
