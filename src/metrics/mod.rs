//! Statistics over the trade book.

mod calculator;

pub use calculator::{PortfolioEntry, ScopeStats, StatsCalculator, StatsReport};
