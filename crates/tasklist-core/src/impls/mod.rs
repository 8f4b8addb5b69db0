//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **HttpTaskApi**: REST バックエンド（reqwest）
//! - **InMemoryTaskApi**: 開発用・テスト用のリモートストア（失敗注入・hold 付き）

pub mod http;
pub mod memory;

// 主要な型を再エクスポート
pub use self::http::HttpTaskApi;
pub use self::memory::{ApiCallCounts, ApiOperation, HoldGate, InMemoryTaskApi};
