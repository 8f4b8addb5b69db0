//! tasklist-core
//!
//! Client-side core of the task list: typed access to the remote task
//! store, a per-view query cache with explicit invalidation, and a
//! debounced search session.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, view, search, errors）
//! - **ports**: 抽象化レイヤー（TaskApi, SearchApi, Clock, IdGenerator）
//! - **impls**: 実装（HttpTaskApi, InMemoryTaskApi）
//! - **cache**: QueryCache と読み取り用の RetryPolicy
//! - **app**: TaskClient, TaskComposer, SearchSession
//! - **config**: ClientConfig（TOML + 環境変数）
//!
//! # 不変条件
//! - リモートストアが正本。ミューテーションはキャッシュに書き込まず、
//!   成功時に該当ビューを無効化するだけ
//! - 読み取りは 1 回だけ再試行、ミューテーションは再試行しない

pub mod app;
pub mod cache;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{
    BuildError, MutationKind, MutationStatus, QueryStatus, SearchSession, SearchState,
    SubmitOutcome, TaskClient, TaskClientBuilder, TaskComposer,
};
pub use config::{ClientConfig, UpdateMethod};
pub use domain::{ClientError, Task, TaskId, View};
