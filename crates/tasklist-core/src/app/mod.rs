//! App - アプリケーション層
//!
//! ports と cache を組み合わせて、UI が使う操作を提供します。
//!
//! # 主要コンポーネント
//! - **TaskClientBuilder**: TaskClient の構築とワイヤリング
//! - **TaskClient**: 一覧の取得と create / toggle / delete
//! - **TaskComposer**: 入力欄（送信中ガード、成功時クリア）
//! - **SearchSession**: debounce 付き検索
//! - **status**: loading / error / pending フラグ

pub mod builder;
pub mod client;
pub mod composer;
pub mod search;
pub mod status;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, TaskClientBuilder};
pub use self::client::TaskClient;
pub use self::composer::{SubmitOutcome, TaskComposer};
pub use self::search::{SearchSession, SearchState};
pub use self::status::{MutationKind, MutationStatus, QueryStatus};
