//! Lifecycle state machine for trades: idea -> entered -> closed, and back.
//!
//! Pure functions over in-memory records. The store persists whatever comes
//! out; callers are expected to read-compute-write without concurrent
//! mutation of the same trade (single-writer assumption).

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::models::{
    Direction, InstrumentType, OptionType, Trade, TradeStatus, TradingStyle,
};

/// Caller-supplied fields for creating or fully replacing a trade.
#[derive(Debug, Clone)]
pub struct TradeDraft {
    pub status: TradeStatus,
    pub trading_style: TradingStyle,
    pub instrument_type: InstrumentType,
    pub ticker: String,
    pub direction: Direction,
    pub option_type: Option<OptionType>,
    pub expiration_date: Option<String>,
    pub strike: Option<Decimal>,
    pub entry_price: Decimal,
    pub exit_price: Option<Decimal>,
    pub quantity: i64,
    pub fees: Decimal,
    pub sl: Option<Decimal>,
    pub tp: Option<Decimal>,
    pub entered: bool,
    pub trader_id: Option<i64>,
    pub notes: Option<String>,
    /// Explicit close timestamp; when absent the state machine supplies one
    pub closed_at: Option<DateTime<Utc>>,
}

impl TradeDraft {
    /// Snapshot an existing trade's mutable fields, for merge-then-update.
    pub fn from_trade(trade: &Trade) -> Self {
        Self {
            status: trade.status,
            trading_style: trade.trading_style,
            instrument_type: trade.instrument_type,
            ticker: trade.ticker.clone(),
            direction: trade.direction,
            option_type: trade.option_type,
            expiration_date: trade.expiration_date.clone(),
            strike: trade.strike,
            entry_price: trade.entry_price,
            exit_price: trade.exit_price,
            quantity: trade.quantity,
            fees: trade.fees,
            sl: trade.sl,
            tp: trade.tp,
            entered: trade.entered,
            trader_id: trade.trader_id,
            notes: trade.notes.clone(),
            closed_at: None,
        }
    }
}

fn validate(draft: &TradeDraft) -> Result<()> {
    if draft.ticker.trim().is_empty() {
        bail!("ticker is required");
    }
    if draft.quantity < 1 {
        bail!("quantity must be at least 1");
    }
    Ok(())
}

/// Build a new trade from a draft, normalizing its lifecycle fields.
///
/// A supplied `exit_price` forces `Closed` regardless of the requested
/// status and defaults `closed_at` to the creation timestamp; otherwise an
/// entered trade starts `Entered` and anything else starts as an `Idea`.
/// The trade id is assigned by the store on insert.
pub fn normalize_new(draft: TradeDraft, now: DateTime<Utc>) -> Result<Trade> {
    validate(&draft)?;

    let status = if draft.exit_price.is_some() {
        TradeStatus::Closed
    } else if draft.entered {
        TradeStatus::Entered
    } else {
        TradeStatus::Idea
    };

    let closed_at = if draft.exit_price.is_some() {
        Some(draft.closed_at.unwrap_or(now))
    } else {
        None
    };

    Ok(Trade {
        id: 0,
        created_at: now,
        status,
        trading_style: draft.trading_style,
        instrument_type: draft.instrument_type,
        ticker: draft.ticker.trim().to_uppercase(),
        direction: draft.direction,
        option_type: draft.option_type,
        expiration_date: draft.expiration_date,
        strike: draft.strike,
        entry_price: draft.entry_price,
        exit_price: draft.exit_price,
        quantity: draft.quantity,
        fees: draft.fees,
        sl: draft.sl,
        tp: draft.tp,
        entered: draft.entered,
        closed_at,
        trader_id: draft.trader_id,
        notes: draft.notes,
    })
}

/// Fully replace a trade's mutable fields, keeping the lifecycle coherent.
///
/// Introducing an `exit_price` stamps `closed_at` (unless the draft supplies
/// one) and forces `Closed`. Removing it clears `closed_at` and reopens the
/// status to `Entered` or `Idea` depending on `entered`.
pub fn apply_update(trade: &mut Trade, draft: TradeDraft, now: DateTime<Utc>) -> Result<()> {
    validate(&draft)?;

    let had_exit_price = trade.exit_price.is_some();

    trade.status = draft.status;
    trade.trading_style = draft.trading_style;
    trade.instrument_type = draft.instrument_type;
    trade.ticker = draft.ticker.trim().to_uppercase();
    trade.direction = draft.direction;
    trade.option_type = draft.option_type;
    trade.expiration_date = draft.expiration_date;
    trade.strike = draft.strike;
    trade.entry_price = draft.entry_price;
    trade.exit_price = draft.exit_price;
    trade.quantity = draft.quantity;
    trade.fees = draft.fees;
    trade.sl = draft.sl;
    trade.tp = draft.tp;
    trade.entered = draft.entered;
    trade.trader_id = draft.trader_id;
    trade.notes = draft.notes;

    match (trade.exit_price.is_some(), had_exit_price) {
        // First close: stamp the close time
        (true, false) => trade.closed_at = Some(draft.closed_at.unwrap_or(now)),
        // Still closed: honor an explicit timestamp, otherwise keep the old one
        (true, true) => {
            if let Some(ts) = draft.closed_at {
                trade.closed_at = Some(ts);
            }
        }
        // Reopened
        (false, _) => trade.closed_at = None,
    }

    if trade.exit_price.is_some() && trade.status != TradeStatus::Closed {
        trade.status = TradeStatus::Closed;
    }
    if trade.exit_price.is_none() && trade.status == TradeStatus::Closed {
        trade.status = if trade.entered {
            TradeStatus::Entered
        } else {
            TradeStatus::Idea
        };
    }

    Ok(())
}

/// Quick-close: record the exit price and stamp the close. `entered` is left
/// alone so paper closes stay paper.
pub fn close(trade: &mut Trade, exit_price: Decimal, now: DateTime<Utc>) {
    trade.exit_price = Some(exit_price);
    trade.status = TradeStatus::Closed;
    trade.closed_at = Some(now);
}

/// Enter a trade in the owner's own book (`trader_id` is `None`).
///
/// Trader-owned ideas go through the copy propagator instead; see
/// [`crate::journal::enter_trade`].
pub fn enter_own(trade: &mut Trade) {
    trade.entered = true;
    trade.status = if trade.exit_price.is_some() {
        TradeStatus::Closed
    } else {
        TradeStatus::Entered
    };
}

/// Back out of a trade. Applies uniformly whatever the owner; a previously
/// propagated copy trade is untouched.
pub fn unenter(trade: &mut Trade) {
    trade.entered = false;
    trade.status = if trade.exit_price.is_some() {
        TradeStatus::Closed
    } else {
        TradeStatus::Idea
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn draft() -> TradeDraft {
        TradeDraft {
            status: TradeStatus::Idea,
            trading_style: TradingStyle::Swing,
            instrument_type: InstrumentType::Stock,
            ticker: "msft".to_string(),
            direction: Direction::Long,
            option_type: None,
            expiration_date: None,
            strike: None,
            entry_price: dec!(300),
            exit_price: None,
            quantity: 5,
            fees: dec!(0),
            sl: None,
            tp: None,
            entered: false,
            trader_id: None,
            notes: None,
            closed_at: None,
        }
    }

    #[test]
    fn test_create_idea() {
        let trade = normalize_new(draft(), Utc::now()).unwrap();
        assert_eq!(trade.status, TradeStatus::Idea);
        assert_eq!(trade.ticker, "MSFT");
        assert!(trade.closed_at.is_none());
    }

    #[test]
    fn test_create_entered() {
        let mut d = draft();
        d.entered = true;
        let trade = normalize_new(d, Utc::now()).unwrap();
        assert_eq!(trade.status, TradeStatus::Entered);
    }

    #[test]
    fn test_create_with_exit_forces_closed() {
        let mut d = draft();
        d.exit_price = Some(dec!(310));
        d.status = TradeStatus::Idea; // requested status is overridden
        let now = Utc::now();
        let trade = normalize_new(d, now).unwrap();
        assert_eq!(trade.status, TradeStatus::Closed);
        assert_eq!(trade.closed_at, Some(now));
    }

    #[test]
    fn test_create_rejects_blank_ticker_and_bad_quantity() {
        let mut d = draft();
        d.ticker = "  ".to_string();
        assert!(normalize_new(d, Utc::now()).is_err());

        let mut d = draft();
        d.quantity = 0;
        assert!(normalize_new(d, Utc::now()).is_err());
    }

    #[test]
    fn test_update_introducing_exit_closes() {
        let mut trade = normalize_new(
            {
                let mut d = draft();
                d.entered = true;
                d
            },
            Utc::now(),
        )
        .unwrap();

        let mut d = TradeDraft::from_trade(&trade);
        d.exit_price = Some(dec!(320));
        let now = Utc::now();
        apply_update(&mut trade, d, now).unwrap();

        assert_eq!(trade.status, TradeStatus::Closed);
        assert_eq!(trade.closed_at, Some(now));
    }

    #[test]
    fn test_update_removing_exit_reopens() {
        let mut trade = normalize_new(
            {
                let mut d = draft();
                d.entered = true;
                d.exit_price = Some(dec!(320));
                d
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(trade.status, TradeStatus::Closed);

        let mut d = TradeDraft::from_trade(&trade);
        d.exit_price = None;
        apply_update(&mut trade, d, Utc::now()).unwrap();

        assert_eq!(trade.status, TradeStatus::Entered);
        assert!(trade.closed_at.is_none());

        // Same removal on a non-entered trade falls back to an idea
        let mut paper = normalize_new(
            {
                let mut d = draft();
                d.exit_price = Some(dec!(320));
                d
            },
            Utc::now(),
        )
        .unwrap();
        let mut d = TradeDraft::from_trade(&paper);
        d.exit_price = None;
        apply_update(&mut paper, d, Utc::now()).unwrap();
        assert_eq!(paper.status, TradeStatus::Idea);
    }

    #[test]
    fn test_update_keeps_original_close_time() {
        let first_close = Utc::now();
        let mut trade = normalize_new(
            {
                let mut d = draft();
                d.exit_price = Some(dec!(320));
                d.closed_at = Some(first_close);
                d
            },
            Utc::now(),
        )
        .unwrap();

        let mut d = TradeDraft::from_trade(&trade);
        d.exit_price = Some(dec!(321));
        apply_update(&mut trade, d, Utc::now() + chrono::Duration::hours(1)).unwrap();

        assert_eq!(trade.closed_at, Some(first_close));
    }

    #[test]
    fn test_quick_close_preserves_entered() {
        let mut trade = normalize_new(draft(), Utc::now()).unwrap();
        assert!(!trade.entered);

        let now = Utc::now();
        close(&mut trade, dec!(295), now);

        assert_eq!(trade.status, TradeStatus::Closed);
        assert_eq!(trade.exit_price, Some(dec!(295)));
        assert_eq!(trade.closed_at, Some(now));
        assert!(!trade.entered, "paper close must stay paper");
    }

    #[test]
    fn test_enter_and_unenter_own_trade() {
        let mut trade = normalize_new(draft(), Utc::now()).unwrap();

        enter_own(&mut trade);
        assert!(trade.entered);
        assert_eq!(trade.status, TradeStatus::Entered);

        unenter(&mut trade);
        assert!(!trade.entered);
        assert_eq!(trade.status, TradeStatus::Idea);

        // With an exit price on record both transitions settle on Closed
        trade.exit_price = Some(dec!(310));
        enter_own(&mut trade);
        assert_eq!(trade.status, TradeStatus::Closed);
        unenter(&mut trade);
        assert_eq!(trade.status, TradeStatus::Closed);
        assert!(!trade.entered);
    }
}
