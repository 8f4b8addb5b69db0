//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait はリモートストア（REST バックエンド）や時刻・ID 採番への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - リモートストアが source of truth（正本）
//! - クライアントはキャッシュを持つが、書き込みは必ずポート経由

pub mod clock;
pub mod id_generator;
pub mod search_api;
pub mod task_api;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::search_api::SearchApi;
pub use self::task_api::TaskApi;
