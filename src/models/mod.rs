//! Data models for trades, traders, and the account ledger.

mod account;
mod trade;
mod trader;

pub use account::Account;
pub use trade::{
    Direction, InstrumentType, OptionType, Trade, TradeStatus, TradingStyle, COPY_MARKER,
    SOURCE_MARKER,
};
pub use trader::Trader;
