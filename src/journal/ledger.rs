//! Account ledger: realized P&L accumulation and the equity identity.

use rust_decimal::Decimal;

use crate::models::{Account, Trade};

/// Sum of realized P&L over the owner's book: entered trades that are not
/// source records. Open trades contribute nothing; a zero outcome flows
/// into the sum but is neither a win nor a loss.
pub fn realized_pnl(trades: &[Trade]) -> Decimal {
    trades
        .iter()
        .filter(|t| t.counts_toward_equity())
        .filter_map(|t| t.pnl())
        .sum()
}

/// Equity is baseline balance plus realized P&L, exactly. No rounding.
pub fn equity(account: &Account, trades: &[Trade]) -> Decimal {
    account.balance + realized_pnl(trades)
}
