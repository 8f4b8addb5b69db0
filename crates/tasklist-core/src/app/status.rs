//! Status - UI 向けの loading / error / pending フラグ

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use serde::Serialize;

use crate::domain::ClientError;

/// State of one cached query (a view, or a search key).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum QueryStatus {
    /// Never fetched.
    #[default]
    Idle,
    /// A fetch is in flight.
    Loading,
    /// Last fetch succeeded.
    Success,
    /// Last fetch failed after retries.
    Error(String),
}

impl QueryStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, QueryStatus::Loading)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            QueryStatus::Error(message) => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    Toggle,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationKind::Create => f.write_str("create"),
            MutationKind::Toggle => f.write_str("toggle"),
            MutationKind::Delete => f.write_str("delete"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum MutationStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Error(String),
}

impl MutationStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, MutationStatus::Pending)
    }
}

#[derive(Debug, Default)]
struct MutationSlot {
    in_flight: usize,
    last: MutationStatus,
}

/// Tracks in-flight mutations per kind.
///
/// `begin` returns a guard; dropping it without `finish` (the future was
/// cancelled) only releases the in-flight count.
#[derive(Debug, Default)]
pub struct MutationTracker {
    slots: Mutex<HashMap<MutationKind, MutationSlot>>,
}

impl MutationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, kind: MutationKind) -> MutationStatus {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        match slots.get(&kind) {
            Some(slot) if slot.in_flight > 0 => MutationStatus::Pending,
            Some(slot) => slot.last.clone(),
            None => MutationStatus::Idle,
        }
    }

    pub fn begin(&self, kind: MutationKind) -> MutationGuard<'_> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.entry(kind).or_default().in_flight += 1;
        MutationGuard {
            tracker: self,
            kind,
            outcome: None,
        }
    }

    fn release(&self, kind: MutationKind, outcome: Option<MutationStatus>) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let slot = slots.entry(kind).or_default();
        slot.in_flight = slot.in_flight.saturating_sub(1);
        if let Some(outcome) = outcome {
            slot.last = outcome;
        }
    }
}

pub struct MutationGuard<'a> {
    tracker: &'a MutationTracker,
    kind: MutationKind,
    outcome: Option<MutationStatus>,
}

impl MutationGuard<'_> {
    /// Record the outcome; released when the guard drops.
    pub fn finish<T>(mut self, result: &Result<T, ClientError>) {
        self.outcome = Some(match result {
            Ok(_) => MutationStatus::Success,
            Err(e) => MutationStatus::Error(e.to_string()),
        });
    }
}

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        self.tracker.release(self.kind, self.outcome.take());
    }
}
