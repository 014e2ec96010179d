//! Account model: the singleton ledger row holding baseline capital.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// The owner's account. Exactly one row exists; the store creates it lazily
/// with defaults on first access. Always passed explicitly into ledger and
/// statistics calls, never read as ambient global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,

    /// Baseline capital. Equity is derived from this plus realized P&L;
    /// updating the balance never retroactively adjusts past trades.
    pub balance: Decimal,

    /// Advisory default stop loss, not enforced by the accounting core
    pub global_sl: Option<Decimal>,

    /// Advisory default take profit, not enforced by the accounting core
    pub global_tp: Option<Decimal>,

    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Baseline balance used when the account row is first created.
    pub fn default_balance() -> Decimal {
        dec!(10000.00)
    }
}

impl Default for Account {
    fn default() -> Self {
        Self {
            id: 1,
            balance: Self::default_balance(),
            global_sl: None,
            global_tp: None,
            updated_at: Utc::now(),
        }
    }
}
