//! View - completed フラグによるタスクの二分割
//!
//! Active（completed = false）と History（completed = true）は互いに素で、
//! タスクは常にどちらか一方にだけ属します。キャッシュのキーにもなります。

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    /// Tasks still to do.
    Active,
    /// Completed tasks.
    History,
}

impl View {
    pub const ALL: [View; 2] = [View::Active, View::History];

    pub fn from_completed(completed: bool) -> Self {
        if completed { View::History } else { View::Active }
    }

    /// Value of the `completed` filter that selects this view.
    pub fn completed(self) -> bool {
        matches!(self, View::History)
    }

    pub fn opposite(self) -> Self {
        match self {
            View::Active => View::History,
            View::History => View::Active,
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Active => f.write_str("active"),
            View::History => f.write_str("history"),
        }
    }
}
