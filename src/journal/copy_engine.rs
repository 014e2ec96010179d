//! Copy-trade propagation: acting on a trader's idea creates a linked copy
//! in the owner's own book.
//!
//! The link is carried as note-text markers on both sides: the trader's
//! record gains a "Source trade #<id>" line and the new copy is created with
//! "Copy of trade #<id>" as its notes. At most one copy may exist per
//! source; callers must serialize enter operations on the same trade id for
//! the check-then-create to hold.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::journal::lifecycle;
use crate::models::{Trade, TradeStatus};

/// Result of entering a trade: the updated record, plus a freshly created
/// copy when the entered trade belonged to a trader and no copy existed yet.
#[derive(Debug, Clone)]
pub struct EnterOutcome {
    pub source: Trade,
    pub copy: Option<Trade>,
}

/// Marker line appended to a trader's idea once it has been copied.
pub fn source_marker(trade_id: i64) -> String {
    format!("Source trade #{trade_id}")
}

/// Notes a propagated copy is created with.
pub fn copy_marker(trade_id: i64) -> String {
    format!("Copy of trade #{trade_id}")
}

/// Case-insensitive marker lookup. The id must end at a non-digit boundary
/// so that "#1" never matches inside "#12".
fn notes_carry_marker(notes: Option<&str>, marker: &str) -> bool {
    let Some(notes) = notes else {
        return false;
    };
    let haystack = notes.to_lowercase();
    let needle = marker.to_lowercase();

    for (idx, _) in haystack.match_indices(&needle) {
        let next = haystack[idx + needle.len()..].chars().next();
        if !next.map_or(false, |c| c.is_ascii_digit()) {
            return true;
        }
    }
    false
}

/// True if some trade in the book already carries this source's copy marker.
pub fn copy_exists_for(source_id: i64, all_trades: &[Trade]) -> bool {
    let marker = copy_marker(source_id);
    all_trades
        .iter()
        .any(|t| notes_carry_marker(t.notes.as_deref(), &marker))
}

/// Enter a trade, propagating a copy when it is a trader's idea.
///
/// Owner-book trades just transition through the lifecycle. A trader-owned
/// trade keeps its own status and ownership; it is marked entered/watched,
/// gains the source marker once, and spawns the owner-book copy unless one
/// already exists (idempotent on repeat enters).
pub fn enter_trade(mut trade: Trade, all_trades: &[Trade], now: DateTime<Utc>) -> EnterOutcome {
    if trade.trader_id.is_none() {
        lifecycle::enter_own(&mut trade);
        return EnterOutcome {
            source: trade,
            copy: None,
        };
    }

    trade.entered = true;

    let marker = source_marker(trade.id);
    if !notes_carry_marker(trade.notes.as_deref(), &marker) {
        trade.notes = Some(match trade.notes.as_deref() {
            Some(existing) if !existing.trim().is_empty() => format!("{existing}\n{marker}"),
            _ => marker,
        });
    }

    let copy = if copy_exists_for(trade.id, all_trades) {
        debug!(source_id = trade.id, "Copy already exists, skipping propagation");
        None
    } else {
        info!(
            source_id = trade.id,
            ticker = %trade.ticker,
            "Copying trader idea into own book"
        );
        Some(make_copy(&trade, now))
    };

    EnterOutcome {
        source: trade,
        copy,
    }
}

/// Build the owner-book copy of a source trade: same economics, fresh
/// lifecycle, linkage notes only.
fn make_copy(source: &Trade, now: DateTime<Utc>) -> Trade {
    Trade {
        id: 0,
        created_at: now,
        status: TradeStatus::Entered,
        trading_style: source.trading_style,
        instrument_type: source.instrument_type,
        ticker: source.ticker.clone(),
        direction: source.direction,
        option_type: source.option_type,
        expiration_date: source.expiration_date.clone(),
        strike: source.strike,
        entry_price: source.entry_price,
        exit_price: None,
        quantity: source.quantity,
        fees: source.fees,
        sl: source.sl,
        tp: source.tp,
        entered: true,
        closed_at: None,
        trader_id: None,
        notes: Some(copy_marker(source.id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, InstrumentType, TradingStyle};
    use rust_decimal_macros::dec;

    fn trader_idea(id: i64, trader_id: Option<i64>) -> Trade {
        Trade {
            id,
            created_at: Utc::now(),
            status: TradeStatus::Idea,
            trading_style: TradingStyle::Daytrading,
            instrument_type: InstrumentType::Stock,
            ticker: "NVDA".to_string(),
            direction: Direction::Long,
            option_type: None,
            expiration_date: None,
            strike: None,
            entry_price: dec!(120),
            exit_price: None,
            quantity: 3,
            fees: dec!(1.50),
            sl: Some(dec!(110)),
            tp: Some(dec!(140)),
            entered: false,
            closed_at: None,
            trader_id,
            notes: Some("breakout setup".to_string()),
        }
    }

    #[test]
    fn test_enter_own_trade_spawns_no_copy() {
        let outcome = enter_trade(trader_idea(1, None), &[], Utc::now());
        assert!(outcome.copy.is_none());
        assert!(outcome.source.entered);
        assert_eq!(outcome.source.status, TradeStatus::Entered);
        assert!(!outcome.source.is_source_trade());
    }

    #[test]
    fn test_enter_trader_idea_creates_copy() {
        let idea = trader_idea(7, Some(42));
        let outcome = enter_trade(idea, &[], Utc::now());

        let source = &outcome.source;
        assert!(source.entered);
        assert_eq!(source.status, TradeStatus::Idea, "source status is untouched");
        assert_eq!(source.trader_id, Some(42), "ownership does not change hands");
        assert!(source.is_source_trade());
        assert!(source.notes.as_deref().unwrap().contains("breakout setup"));

        let copy = outcome.copy.expect("copy should be created");
        assert_eq!(copy.trader_id, None);
        assert_eq!(copy.status, TradeStatus::Entered);
        assert!(copy.entered);
        assert_eq!(copy.exit_price, None);
        assert_eq!(copy.closed_at, None);
        assert_eq!(copy.notes.as_deref(), Some("Copy of trade #7"));
        // Economics travel with the copy
        assert_eq!(copy.ticker, "NVDA");
        assert_eq!(copy.entry_price, dec!(120));
        assert_eq!(copy.quantity, 3);
        assert_eq!(copy.fees, dec!(1.50));
        assert_eq!(copy.sl, Some(dec!(110)));
        assert_eq!(copy.tp, Some(dec!(140)));
    }

    #[test]
    fn test_repeat_enter_is_idempotent() {
        let idea = trader_idea(7, Some(42));
        let first = enter_trade(idea, &[], Utc::now());
        let copy = first.copy.unwrap();

        // Second enter sees the existing copy in the book
        let book = vec![first.source.clone(), copy];
        let second = enter_trade(first.source, &book, Utc::now());

        assert!(second.copy.is_none(), "at most one copy per source");
        let notes = second.source.notes.unwrap().to_lowercase();
        assert_eq!(
            notes.matches("source trade #").count(),
            1,
            "marker must not duplicate on repeat"
        );
    }

    #[test]
    fn test_marker_lookup_respects_digit_boundary() {
        let mut other = trader_idea(99, None);
        other.notes = Some("Copy of trade #12".to_string());

        assert!(copy_exists_for(12, std::slice::from_ref(&other)));
        assert!(!copy_exists_for(1, std::slice::from_ref(&other)));
    }

    #[test]
    fn test_source_marker_starts_notes_when_empty() {
        let mut idea = trader_idea(5, Some(1));
        idea.notes = None;
        let outcome = enter_trade(idea, &[], Utc::now());
        assert_eq!(outcome.source.notes.as_deref(), Some("Source trade #5"));
    }
}
