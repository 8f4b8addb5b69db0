//! Domain identifiers.
//!
//! Task の ID はリモートストアが採番する不透明な文字列です。
//! クライアントは中身を解釈せず、比較・表示・URL への埋め込みにのみ使います。
//!
//! - 本番（HTTP）: バックエンドが UUID を採番
//! - 開発用（InMemory）: `IdGenerator` が ULID を採番

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identifier of a Task, assigned by the remote store.
///
/// `#[serde(transparent)]` なので JSON 上はただの文字列です。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// ULID から TaskId を作成（InMemory ストア用）
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
