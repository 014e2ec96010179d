//! Journal logic: trade lifecycle, copy propagation, and the account ledger.

pub mod copy_engine;
pub mod ledger;
pub mod lifecycle;

pub use copy_engine::{enter_trade, EnterOutcome};
pub use lifecycle::TradeDraft;
