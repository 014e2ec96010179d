//! Trader model: a named counterparty whose ideas can be watched and copied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A trader (or strategy bucket) the owner follows. Trades carrying this
/// trader's id are the trader's own ideas; acting on one copies it into the
/// owner's book rather than mutating the idea itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trader {
    /// Unique trader identifier (assigned by the store)
    pub id: i64,

    /// Unique display name
    pub name: String,

    /// When the trader was added
    pub created_at: DateTime<Utc>,
}

