//! Statistics aggregation: win/loss counts, P&L totals, and portfolio
//! breakdowns across the whole trade book.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{Account, InstrumentType, Trade, Trader};

/// Win/loss and P&L summary for one scope of trades.
///
/// Counts cover every trade handed to the scope; the monetary fields only
/// ever aggregate realized outcomes of entered, non-source trades. Open
/// trades have no P&L and contribute nothing anywhere.
#[derive(Debug, Clone, Serialize)]
pub struct ScopeStats {
    pub total_trades: usize,
    pub closed_trades: usize,
    pub open_trades: usize,

    /// Total realized P&L
    pub total_pnl: Decimal,

    /// Trades with P&L > 0
    pub winning_trades: u32,

    /// Trades with P&L < 0; break-even outcomes count as neither
    pub losing_trades: u32,

    /// Percentage, rounded to two decimal places; 0 when no trade qualifies
    pub win_rate: f64,

    /// Average profit on winning trades
    pub avg_win: Decimal,

    /// Average loss on losing trades (absolute value)
    pub avg_loss: Decimal,

    /// Gross profit / gross loss
    pub profit_factor: f64,

    /// Mean realized P&L per closed, entered trade
    pub expectancy: Decimal,
}

impl ScopeStats {
    fn empty(total_trades: usize, closed_trades: usize) -> Self {
        Self {
            total_trades,
            closed_trades,
            open_trades: total_trades - closed_trades,
            total_pnl: Decimal::ZERO,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: 0.0,
            avg_win: Decimal::ZERO,
            avg_loss: Decimal::ZERO,
            profit_factor: 0.0,
            expectancy: Decimal::ZERO,
        }
    }
}

/// One row of the portfolio breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioEntry {
    pub label: String,
    pub pnl: Decimal,
    /// Account balance plus this scope's P&L
    pub equity: Decimal,
    pub trades: usize,
}

/// Full statistics report over the trade book.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub overall: ScopeStats,
    pub stock: ScopeStats,
    pub option: ScopeStats,

    /// Largest peak-to-trough drop of the realized equity curve, absolute
    pub max_drawdown: Decimal,

    /// "All Traders", "Self (unassigned)", then one row per trader
    pub portfolio: Vec<PortfolioEntry>,
}

/// Calculator producing the statistics report.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Aggregate the full trade set against the account baseline.
    ///
    /// The per-trader portfolio rows deliberately use a different filter
    /// from the All/Self rows: a trader's book is judged on all of its
    /// closed ideas, whether or not the owner ever entered them.
    pub fn calculate(trades: &[Trade], traders: &[Trader], account: &Account) -> StatsReport {
        let all: Vec<&Trade> = trades.iter().collect();
        let stock: Vec<&Trade> = trades
            .iter()
            .filter(|t| t.instrument_type == InstrumentType::Stock)
            .collect();
        let option: Vec<&Trade> = trades
            .iter()
            .filter(|t| t.instrument_type == InstrumentType::Option)
            .collect();

        let entered_closed: Vec<&Trade> = trades
            .iter()
            .filter(|t| t.is_closed() && t.counts_toward_equity())
            .collect();

        let mut portfolio = Vec::with_capacity(traders.len() + 2);

        let all_pnl = sum_pnl(&entered_closed);
        portfolio.push(PortfolioEntry {
            label: "All Traders".to_string(),
            pnl: all_pnl,
            equity: account.balance + all_pnl,
            trades: entered_closed.len(),
        });

        let self_trades: Vec<&Trade> = entered_closed
            .iter()
            .copied()
            .filter(|t| t.trader_id.is_none())
            .collect();
        let self_pnl = sum_pnl(&self_trades);
        portfolio.push(PortfolioEntry {
            label: "Self (unassigned)".to_string(),
            pnl: self_pnl,
            equity: account.balance + self_pnl,
            trades: self_trades.len(),
        });

        for trader in traders {
            let trader_trades: Vec<&Trade> = trades
                .iter()
                .filter(|t| t.trader_id == Some(trader.id) && t.is_closed())
                .collect();
            let trader_pnl = sum_pnl(&trader_trades);
            portfolio.push(PortfolioEntry {
                label: trader.name.clone(),
                pnl: trader_pnl,
                equity: account.balance + trader_pnl,
                trades: trader_trades.len(),
            });
        }

        StatsReport {
            overall: scope_stats(&all),
            stock: scope_stats(&stock),
            option: scope_stats(&option),
            max_drawdown: realized_drawdown(trades),
            portfolio,
        }
    }
}

fn sum_pnl(trades: &[&Trade]) -> Decimal {
    let mut total = Decimal::ZERO;
    for trade in trades {
        if let Some(pnl) = trade.pnl() {
            total += pnl;
        }
    }
    total
}

fn scope_stats(trades: &[&Trade]) -> ScopeStats {
    let closed_count = trades.iter().filter(|t| t.is_closed()).count();
    let mut stats = ScopeStats::empty(trades.len(), closed_count);

    // Realized outcomes of the owner's book within this scope
    let pnls: Vec<Decimal> = trades
        .iter()
        .filter(|t| t.counts_toward_equity())
        .filter_map(|t| t.pnl())
        .collect();

    if pnls.is_empty() {
        return stats;
    }

    let wins: Vec<Decimal> = pnls.iter().copied().filter(|p| *p > Decimal::ZERO).collect();
    let losses: Vec<Decimal> = pnls.iter().copied().filter(|p| *p < Decimal::ZERO).collect();

    stats.winning_trades = wins.len() as u32;
    stats.losing_trades = losses.len() as u32;
    stats.total_pnl = pnls.iter().copied().sum();

    stats.win_rate = round2(wins.len() as f64 / pnls.len() as f64 * 100.0);

    if !wins.is_empty() {
        stats.avg_win = wins.iter().copied().sum::<Decimal>() / Decimal::from(wins.len() as u32);
    }
    if !losses.is_empty() {
        stats.avg_loss =
            losses.iter().map(|l| l.abs()).sum::<Decimal>() / Decimal::from(losses.len() as u32);
    }

    let gross_profit: Decimal = wins.iter().copied().sum();
    let gross_loss: Decimal = losses.iter().map(|l| l.abs()).sum();
    if gross_loss > Decimal::ZERO {
        stats.profit_factor =
            gross_profit.to_f64().unwrap_or(0.0) / gross_loss.to_f64().unwrap_or(1.0);
    }

    stats.expectancy = stats.total_pnl / Decimal::from(pnls.len() as u32);

    stats
}

/// Maximum drawdown of the realized equity curve: entered, non-source
/// closed trades replayed in close order, accumulating from zero.
fn realized_drawdown(trades: &[Trade]) -> Decimal {
    let mut outcomes: Vec<(chrono::DateTime<chrono::Utc>, Decimal)> = trades
        .iter()
        .filter(|t| t.counts_toward_equity())
        .filter_map(|t| t.pnl().map(|p| (t.closed_at.unwrap_or(t.created_at), p)))
        .collect();
    outcomes.sort_by_key(|(ts, _)| *ts);

    let mut equity = Decimal::ZERO;
    let mut peak = Decimal::ZERO;
    let mut max_dd = Decimal::ZERO;

    for (_, pnl) in outcomes {
        equity += pnl;
        if equity > peak {
            peak = equity;
        }
        let dd = peak - equity;
        if dd > max_dd {
            max_dd = dd;
        }
    }

    max_dd
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, TradeStatus, TradingStyle};
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    struct Fixture {
        next_id: i64,
        trades: Vec<Trade>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                next_id: 1,
                trades: Vec::new(),
            }
        }

        fn add(&mut self, entry: Decimal, exit: Option<Decimal>, entered: bool) -> &mut Trade {
            let id = self.next_id;
            self.next_id += 1;
            let closed_at = exit.map(|_| Utc::now() + Duration::minutes(id));
            self.trades.push(Trade {
                id,
                created_at: Utc::now(),
                status: if exit.is_some() {
                    TradeStatus::Closed
                } else {
                    TradeStatus::Idea
                },
                trading_style: TradingStyle::Swing,
                instrument_type: InstrumentType::Stock,
                ticker: "TSLA".to_string(),
                direction: Direction::Long,
                option_type: None,
                expiration_date: None,
                strike: None,
                entry_price: entry,
                exit_price: exit,
                quantity: 1,
                fees: dec!(0),
                sl: None,
                tp: None,
                entered,
                closed_at,
                trader_id: None,
                notes: None,
            });
            self.trades.last_mut().unwrap()
        }
    }

    #[test]
    fn test_overall_counts_and_pnl() {
        let mut fx = Fixture::new();
        fx.add(dec!(100), Some(dec!(110)), true); // +10 win
        fx.add(dec!(100), Some(dec!(95)), true); // -5 loss
        fx.add(dec!(100), Some(dec!(100)), true); // 0, neither
        fx.add(dec!(100), None, true); // open
        fx.add(dec!(100), Some(dec!(200)), false); // paper close

        let report =
            StatsCalculator::calculate(&fx.trades, &[], &Account::default());

        let s = &report.overall;
        assert_eq!(s.total_trades, 5);
        assert_eq!(s.closed_trades, 4);
        assert_eq!(s.open_trades, 1);
        assert_eq!(s.total_pnl, dec!(5));
        assert_eq!(s.winning_trades, 1);
        assert_eq!(s.losing_trades, 1);
        // 1 win of 3 entered-closed trades
        assert_eq!(s.win_rate, 33.33);
        assert_eq!(s.avg_win, dec!(10));
        assert_eq!(s.avg_loss, dec!(5));
        assert!((s.profit_factor - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_win_rate_zero_denominator() {
        let mut fx = Fixture::new();
        fx.add(dec!(100), None, true); // open
        fx.add(dec!(100), Some(dec!(120)), false); // paper

        let report =
            StatsCalculator::calculate(&fx.trades, &[], &Account::default());

        assert_eq!(report.overall.win_rate, 0.0);
        assert_eq!(report.overall.total_pnl, Decimal::ZERO);
        assert_eq!(report.overall.winning_trades, 0);
    }

    #[test]
    fn test_per_instrument_split() {
        let mut fx = Fixture::new();
        fx.add(dec!(100), Some(dec!(110)), true); // stock +10
        let option = fx.add(dec!(2), Some(dec!(3)), true); // option +100
        option.instrument_type = InstrumentType::Option;

        let report =
            StatsCalculator::calculate(&fx.trades, &[], &Account::default());

        assert_eq!(report.stock.total_trades, 1);
        assert_eq!(report.stock.total_pnl, dec!(10));
        assert_eq!(report.option.total_trades, 1);
        assert_eq!(report.option.total_pnl, dec!(100));
        assert_eq!(report.overall.total_pnl, dec!(110));
    }

    #[test]
    fn test_source_excluded_copy_included() {
        let mut fx = Fixture::new();
        let source = fx.add(dec!(100), Some(dec!(150)), true);
        source.trader_id = Some(1);
        source.notes = Some("Source trade #1".to_string());
        let copy = fx.add(dec!(100), Some(dec!(150)), true);
        copy.notes = Some("Copy of trade #1".to_string());

        let report =
            StatsCalculator::calculate(&fx.trades, &[], &Account::default());

        // Only the copy's +50 counts, and only once
        assert_eq!(report.overall.total_pnl, dec!(50));
        assert_eq!(report.overall.winning_trades, 1);
        assert_eq!(report.overall.win_rate, 100.0);
    }

    #[test]
    fn test_portfolio_breakdown_scopes() {
        let account = Account::default();
        let trader = Trader {
            id: 1,
            name: "Alice".to_string(),
            created_at: Utc::now(),
        };

        let mut fx = Fixture::new();
        fx.add(dec!(100), Some(dec!(120)), true); // self +20
        let source = fx.add(dec!(50), Some(dec!(70)), true); // Alice's, watched
        source.trader_id = Some(1);
        source.notes = Some("Source trade #2".to_string());
        let copy = fx.add(dec!(50), Some(dec!(71)), true); // copy +21
        copy.notes = Some("Copy of trade #2".to_string());
        let paper_idea = fx.add(dec!(10), Some(dec!(8)), false); // Alice's paper idea -2
        paper_idea.trader_id = Some(1);

        let report = StatsCalculator::calculate(&fx.trades, &[trader], &account);

        assert_eq!(report.portfolio.len(), 3);

        let all = &report.portfolio[0];
        assert_eq!(all.label, "All Traders");
        assert_eq!(all.pnl, dec!(41)); // 20 + 21, source excluded
        assert_eq!(all.equity, account.balance + dec!(41));
        assert_eq!(all.trades, 2);

        let own = &report.portfolio[1];
        assert_eq!(own.label, "Self (unassigned)");
        assert_eq!(own.pnl, dec!(41));
        assert_eq!(own.trades, 2);

        // Trader scope counts every closed idea of theirs, entered or not,
        // source marker or not: +20 and -2.
        let alice = &report.portfolio[2];
        assert_eq!(alice.label, "Alice");
        assert_eq!(alice.pnl, dec!(18));
        assert_eq!(alice.equity, account.balance + dec!(18));
        assert_eq!(alice.trades, 2);
    }

    #[test]
    fn test_realized_drawdown() {
        let mut fx = Fixture::new();
        // Replayed in close order: +100, +50, -80, -20, +100 -> trough 100 below peak 150
        for (entry, exit) in [
            (dec!(100), dec!(200)),
            (dec!(100), dec!(150)),
            (dec!(100), dec!(20)),
            (dec!(100), dec!(80)),
            (dec!(100), dec!(200)),
        ] {
            fx.add(entry, Some(exit), true);
        }

        let report =
            StatsCalculator::calculate(&fx.trades, &[], &Account::default());
        assert_eq!(report.max_drawdown, dec!(100));
    }
}
