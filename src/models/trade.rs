//! Trade model: one logged position or idea, plus its P&L calculation.

use std::str::FromStr;

use anyhow::bail;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a trade.
///
/// `Closed` can lag behind the economic close: `exit_price` being present is
/// what makes a trade closed for P&L purposes, independent of this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Idea,
    Entered,
    Closed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Idea => "idea",
            TradeStatus::Entered => "entered",
            TradeStatus::Closed => "closed",
        }
    }
}

impl FromStr for TradeStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "idea" => Ok(TradeStatus::Idea),
            "entered" => Ok(TradeStatus::Entered),
            "closed" => Ok(TradeStatus::Closed),
            other => bail!("unknown trade status: {other}"),
        }
    }
}

/// Holding-period style of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingStyle {
    Swing,
    Daytrading,
}

impl TradingStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingStyle::Swing => "swing",
            TradingStyle::Daytrading => "daytrading",
        }
    }
}

impl FromStr for TradingStyle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "swing" => Ok(TradingStyle::Swing),
            "daytrading" => Ok(TradingStyle::Daytrading),
            other => bail!("unknown trading style: {other}"),
        }
    }
}

/// Instrument being traded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentType {
    Stock,
    Option,
}

impl InstrumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentType::Stock => "stock",
            InstrumentType::Option => "option",
        }
    }

    /// Contract multiplier applied to per-unit price moves.
    pub fn multiplier(&self) -> Decimal {
        match self {
            InstrumentType::Stock => Decimal::ONE,
            InstrumentType::Option => Decimal::ONE_HUNDRED,
        }
    }
}

impl FromStr for InstrumentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stock" => Ok(InstrumentType::Stock),
            "option" => Ok(InstrumentType::Option),
            other => bail!("unknown instrument type: {other}"),
        }
    }
}

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }
}

impl FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "long" => Ok(Direction::Long),
            "short" => Ok(Direction::Short),
            other => bail!("unknown direction: {other}"),
        }
    }
}

/// Option contract type, only meaningful for option trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionType::Call => "CALL",
            OptionType::Put => "PUT",
        }
    }
}

impl FromStr for OptionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "call" => Ok(OptionType::Call),
            "put" => Ok(OptionType::Put),
            other => bail!("unknown option type: {other}"),
        }
    }
}

/// Notes marker identifying a trader's idea that has been copied into the
/// owner's own book.
pub const SOURCE_MARKER: &str = "source trade #";

/// Notes marker identifying a trade created by copy propagation.
pub const COPY_MARKER: &str = "copy of trade #";

/// One logged position or idea.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    /// Unique trade identifier (assigned by the store)
    pub id: i64,

    /// When the trade was logged
    pub created_at: DateTime<Utc>,

    /// Lifecycle status
    pub status: TradeStatus,

    pub trading_style: TradingStyle,

    pub instrument_type: InstrumentType,

    /// Uppercased symbol
    pub ticker: String,

    pub direction: Direction,

    // Option-specific fields
    pub option_type: Option<OptionType>,

    /// Free-form date string as the user typed it
    pub expiration_date: Option<String>,

    pub strike: Option<Decimal>,

    /// Entry price per unit
    pub entry_price: Decimal,

    /// Exit price per unit; presence signals an economic close
    pub exit_price: Option<Decimal>,

    /// Number of shares or contracts
    pub quantity: i64,

    /// Total fees, always subtracted from P&L
    pub fees: Decimal,

    /// Advisory stop loss, not enforced
    pub sl: Option<Decimal>,

    /// Advisory take profit, not enforced
    pub tp: Option<Decimal>,

    /// Whether the owner put capital behind this trade. A closed trade with
    /// `entered = false` is a paper outcome.
    pub entered: bool,

    /// Set when `exit_price` first becomes present
    pub closed_at: Option<DateTime<Utc>>,

    /// Owning trader; `None` means the owner's own book
    pub trader_id: Option<i64>,

    /// Free text; also carries the copy-trade linkage markers
    pub notes: Option<String>,
}

impl Trade {
    /// Calculate realized P&L, or `None` while the position is still open.
    ///
    /// `(exit - entry)`, negated for shorts, times quantity and the
    /// instrument multiplier, minus fees. Exact decimal arithmetic.
    pub fn pnl(&self) -> Option<Decimal> {
        let exit_price = self.exit_price?;

        let mut price_diff = exit_price - self.entry_price;
        if self.direction == Direction::Short {
            price_diff = -price_diff;
        }

        let raw = price_diff * Decimal::from(self.quantity) * self.instrument_type.multiplier();

        Some(raw - self.fees)
    }

    /// True if the trade is economically closed, whatever `status` says.
    pub fn is_closed(&self) -> bool {
        self.exit_price.is_some()
    }

    /// True if the notes mark this as a trader's original idea that was
    /// copied into the owner's book. Source trades stay attributable to the
    /// trader and never count toward the owner's realized totals.
    pub fn is_source_trade(&self) -> bool {
        self.notes_contain(SOURCE_MARKER)
    }

    /// True if the notes mark this as a propagated copy. Copies sit in the
    /// owner's book and count normally.
    pub fn is_copy_trade(&self) -> bool {
        self.notes_contain(COPY_MARKER)
    }

    /// Whether this trade's realized P&L belongs in the owner's equity:
    /// capital was committed and it is not a trader's source record.
    pub fn counts_toward_equity(&self) -> bool {
        self.entered && !self.is_source_trade()
    }

    fn notes_contain(&self, marker: &str) -> bool {
        match &self.notes {
            Some(notes) => notes.to_lowercase().contains(marker),
            None => false,
        }
    }
}
