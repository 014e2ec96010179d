//! SQLite persistence for the journal.
//!
//! Monetary columns are stored as TEXT and parsed back into `Decimal` so
//! that prices and balances round-trip exactly; timestamps are RFC 3339
//! TEXT. The pool is capped at one connection: the journal is a
//! single-writer tool and read-compute-write sequences must not interleave.

use std::str::FromStr;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::models::{Account, Trade, TradeStatus, Trader};

/// Database handle wrapping the connection pool.
pub struct Database {
    pool: SqlitePool,
}

/// Optional filters for trade listings.
#[derive(Debug, Default, Clone)]
pub struct TradeFilter {
    pub status: Option<TradeStatus>,
    /// Substring match on the ticker
    pub ticker: Option<String>,
    pub trader_id: Option<i64>,
}

/// Raw trades row; money and timestamps stay TEXT until conversion.
#[derive(Debug, Clone, sqlx::FromRow)]
struct TradeRow {
    id: i64,
    created_at: String,
    status: String,
    trading_style: String,
    instrument_type: String,
    ticker: String,
    direction: String,
    option_type: Option<String>,
    expiration_date: Option<String>,
    strike: Option<String>,
    entry_price: String,
    exit_price: Option<String>,
    quantity: i64,
    fees: String,
    sl: Option<String>,
    tp: Option<String>,
    entered: bool,
    closed_at: Option<String>,
    trader_id: Option<i64>,
    notes: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct TraderRow {
    id: i64,
    name: String,
    created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct AccountRow {
    id: i64,
    balance: String,
    global_sl: Option<String>,
    global_tp: Option<String>,
    updated_at: String,
}

fn parse_decimal(value: &str, column: &str) -> Result<Decimal> {
    Decimal::from_str(value).with_context(|| format!("invalid decimal in {column}: {value:?}"))
}

fn parse_opt_decimal(value: Option<&str>, column: &str) -> Result<Option<Decimal>> {
    value.map(|v| parse_decimal(v, column)).transpose()
}

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .with_context(|| format!("invalid timestamp in {column}: {value:?}"))
}

impl TradeRow {
    fn into_trade(self) -> Result<Trade> {
        Ok(Trade {
            id: self.id,
            created_at: parse_timestamp(&self.created_at, "trades.created_at")?,
            status: self.status.parse()?,
            trading_style: self.trading_style.parse()?,
            instrument_type: self.instrument_type.parse()?,
            ticker: self.ticker,
            direction: self.direction.parse()?,
            option_type: self.option_type.as_deref().map(str::parse).transpose()?,
            expiration_date: self.expiration_date,
            strike: parse_opt_decimal(self.strike.as_deref(), "trades.strike")?,
            entry_price: parse_decimal(&self.entry_price, "trades.entry_price")?,
            exit_price: parse_opt_decimal(self.exit_price.as_deref(), "trades.exit_price")?,
            quantity: self.quantity,
            fees: parse_decimal(&self.fees, "trades.fees")?,
            sl: parse_opt_decimal(self.sl.as_deref(), "trades.sl")?,
            tp: parse_opt_decimal(self.tp.as_deref(), "trades.tp")?,
            entered: self.entered,
            closed_at: self
                .closed_at
                .as_deref()
                .map(|ts| parse_timestamp(ts, "trades.closed_at"))
                .transpose()?,
            trader_id: self.trader_id,
            notes: self.notes,
        })
    }
}

impl TraderRow {
    fn into_trader(self) -> Result<Trader> {
        Ok(Trader {
            id: self.id,
            name: self.name,
            created_at: parse_timestamp(&self.created_at, "traders.created_at")?,
        })
    }
}

impl AccountRow {
    fn into_account(self) -> Result<Account> {
        Ok(Account {
            id: self.id,
            balance: parse_decimal(&self.balance, "account.balance")?,
            global_sl: parse_opt_decimal(self.global_sl.as_deref(), "account.global_sl")?,
            global_tp: parse_opt_decimal(self.global_tp.as_deref(), "account.global_tp")?,
            updated_at: parse_timestamp(&self.updated_at, "account.updated_at")?,
        })
    }
}

impl Database {
    /// Open (or create) the journal database and run migrations.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'idea',
                trading_style TEXT NOT NULL,
                instrument_type TEXT NOT NULL,
                ticker TEXT NOT NULL,
                direction TEXT NOT NULL DEFAULT 'long',
                option_type TEXT,
                expiration_date TEXT,
                strike TEXT,
                entry_price TEXT NOT NULL,
                exit_price TEXT,
                quantity INTEGER NOT NULL DEFAULT 1,
                fees TEXT NOT NULL DEFAULT '0',
                sl TEXT,
                tp TEXT,
                entered INTEGER NOT NULL DEFAULT 0,
                closed_at TEXT,
                trader_id INTEGER,
                notes TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS traders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS account (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                balance TEXT NOT NULL,
                global_sl TEXT,
                global_tp TEXT,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_ticker ON trades(ticker)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_trader ON trades(trader_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ==================== Trades ====================

    /// Insert a trade and return its assigned id.
    pub async fn insert_trade(&self, trade: &Trade) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO trades (
                created_at, status, trading_style, instrument_type, ticker,
                direction, option_type, expiration_date, strike, entry_price,
                exit_price, quantity, fees, sl, tp, entered, closed_at,
                trader_id, notes
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(trade.created_at.to_rfc3339())
        .bind(trade.status.as_str())
        .bind(trade.trading_style.as_str())
        .bind(trade.instrument_type.as_str())
        .bind(&trade.ticker)
        .bind(trade.direction.as_str())
        .bind(trade.option_type.map(|o| o.as_str()))
        .bind(&trade.expiration_date)
        .bind(trade.strike.map(|d| d.to_string()))
        .bind(trade.entry_price.to_string())
        .bind(trade.exit_price.map(|d| d.to_string()))
        .bind(trade.quantity)
        .bind(trade.fees.to_string())
        .bind(trade.sl.map(|d| d.to_string()))
        .bind(trade.tp.map(|d| d.to_string()))
        .bind(trade.entered)
        .bind(trade.closed_at.map(|ts| ts.to_rfc3339()))
        .bind(trade.trader_id)
        .bind(&trade.notes)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert trade")?;

        Ok(id)
    }

    /// Point lookup by id.
    pub async fn get_trade(&self, id: i64) -> Result<Option<Trade>> {
        let row = sqlx::query_as::<_, TradeRow>("SELECT * FROM trades WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TradeRow::into_trade).transpose()
    }

    /// List trades, newest first, with optional filters.
    pub async fn list_trades(&self, filter: &TradeFilter) -> Result<Vec<Trade>> {
        let mut sql = String::from("SELECT * FROM trades");
        let mut clauses: Vec<&str> = Vec::new();

        if filter.status.is_some() {
            clauses.push("status = ?");
        }
        if filter.ticker.is_some() {
            clauses.push("ticker LIKE ?");
        }
        if filter.trader_id.is_some() {
            clauses.push("trader_id = ?");
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");

        let mut query = sqlx::query_as::<_, TradeRow>(&sql);
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(ticker) = &filter.ticker {
            query = query.bind(format!("%{}%", ticker.to_uppercase()));
        }
        if let Some(trader_id) = filter.trader_id {
            query = query.bind(trader_id);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(TradeRow::into_trade).collect()
    }

    /// Every trade in the book, oldest first. Used when an operation needs
    /// the full set materialized (statistics, copy propagation).
    pub async fn all_trades(&self) -> Result<Vec<Trade>> {
        let rows = sqlx::query_as::<_, TradeRow>("SELECT * FROM trades ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TradeRow::into_trade).collect()
    }

    /// Persist every mutable field of a trade.
    pub async fn update_trade(&self, trade: &Trade) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE trades SET
                status = ?, trading_style = ?, instrument_type = ?, ticker = ?,
                direction = ?, option_type = ?, expiration_date = ?, strike = ?,
                entry_price = ?, exit_price = ?, quantity = ?, fees = ?,
                sl = ?, tp = ?, entered = ?, closed_at = ?, trader_id = ?,
                notes = ?
            WHERE id = ?
            "#,
        )
        .bind(trade.status.as_str())
        .bind(trade.trading_style.as_str())
        .bind(trade.instrument_type.as_str())
        .bind(&trade.ticker)
        .bind(trade.direction.as_str())
        .bind(trade.option_type.map(|o| o.as_str()))
        .bind(&trade.expiration_date)
        .bind(trade.strike.map(|d| d.to_string()))
        .bind(trade.entry_price.to_string())
        .bind(trade.exit_price.map(|d| d.to_string()))
        .bind(trade.quantity)
        .bind(trade.fees.to_string())
        .bind(trade.sl.map(|d| d.to_string()))
        .bind(trade.tp.map(|d| d.to_string()))
        .bind(trade.entered)
        .bind(trade.closed_at.map(|ts| ts.to_rfc3339()))
        .bind(trade.trader_id)
        .bind(&trade.notes)
        .bind(trade.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            bail!("trade {} not found", trade.id);
        }
        Ok(())
    }

    /// Delete a trade. Copies and sources linked through notes markers are
    /// untouched.
    pub async fn delete_trade(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM trades WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ==================== Traders ====================

    /// Add a trader. Names are unique.
    pub async fn create_trader(&self, name: &str) -> Result<Trader> {
        let name = name.trim();
        if name.is_empty() {
            bail!("trader name is required");
        }

        let created_at = Utc::now();
        let id: i64 =
            sqlx::query_scalar("INSERT INTO traders (name, created_at) VALUES (?, ?) RETURNING id")
                .bind(name)
                .bind(created_at.to_rfc3339())
                .fetch_one(&self.pool)
                .await
                .with_context(|| format!("Failed to add trader {name:?} (names are unique)"))?;

        Ok(Trader {
            id,
            name: name.to_string(),
            created_at,
        })
    }

    /// All traders, by name.
    pub async fn list_traders(&self) -> Result<Vec<Trader>> {
        let rows = sqlx::query_as::<_, TraderRow>("SELECT * FROM traders ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TraderRow::into_trader).collect()
    }

    /// Delete a trader, unassigning their trades in the same transaction so
    /// no dangling `trader_id` survives.
    pub async fn delete_trader(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE trades SET trader_id = NULL WHERE trader_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM traders WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== Account ====================

    /// Fetch the singleton account, creating it with defaults on first use.
    pub async fn get_or_create_account(&self) -> Result<Account> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO account (id, balance, updated_at)
            VALUES (1, ?, ?)
            "#,
        )
        .bind(Account::default_balance().to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, AccountRow>("SELECT * FROM account WHERE id = 1")
            .fetch_one(&self.pool)
            .await
            .context("Account row missing after initialization")?;

        row.into_account()
    }

    /// Overwrite the baseline balance. Past trades are never re-valued.
    pub async fn update_balance(&self, balance: Decimal) -> Result<Account> {
        self.get_or_create_account().await?;

        sqlx::query("UPDATE account SET balance = ?, updated_at = ? WHERE id = 1")
            .bind(balance.to_string())
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;

        self.get_or_create_account().await
    }

    /// Set or clear the advisory default stop-loss / take-profit levels.
    pub async fn update_limits(
        &self,
        global_sl: Option<Decimal>,
        global_tp: Option<Decimal>,
    ) -> Result<Account> {
        self.get_or_create_account().await?;

        sqlx::query("UPDATE account SET global_sl = ?, global_tp = ?, updated_at = ? WHERE id = 1")
            .bind(global_sl.map(|d| d.to_string()))
            .bind(global_tp.map(|d| d.to_string()))
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;

        self.get_or_create_account().await
    }
}
