//! Restock pipeline state machine.

use serde::{Deserialize, Serialize};

/// The stage of a restock pipeline.
///
/// State transitions:
/// ```text
/// Accepted ──► Manufacturing ──► Completed
///    ▲                              │
///    └──────── next request ────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RestockStatus {
    /// Request stored, waiting for the first wake-up.
    Accepted,

    /// Manufacturing lead time is elapsing.
    Manufacturing,

    /// Stock is ready and completion has been announced (terminal state).
    Completed,
}

impl RestockStatus {
    /// Returns true while a request for the item is outstanding.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, RestockStatus::Accepted | RestockStatus::Manufacturing)
    }

    /// Returns true if a new request may replace this one.
    pub fn can_accept(&self) -> bool {
        !self.is_in_progress()
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RestockStatus::Accepted => "Accepted",
            RestockStatus::Manufacturing => "Manufacturing",
            RestockStatus::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for RestockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
