//! TaskApi port - タスクリソースへの CRUD
//!
//! # 実装
//! - **HttpTaskApi**: REST バックエンド（本番用）
//! - **InMemoryTaskApi**: プロセス内ストア（テスト・デモ用）

use async_trait::async_trait;

use crate::domain::{ClientError, CreateTaskInput, Task, TaskId, UpdateTaskInput};

/// TaskApi は型付き呼び出しをリモートストアへ転送する
///
/// 実装はキャッシュを持ちません。キャッシュと無効化は `TaskClient` の責務です。
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// `GET /tasks?completed={bool}`. Server order is preserved.
    async fn list_tasks(&self, completed: bool) -> Result<Vec<Task>, ClientError>;

    /// `GET /tasks/{id}`
    async fn get_task(&self, id: &TaskId) -> Result<Task, ClientError>;

    /// `POST /tasks`
    async fn create_task(&self, input: &CreateTaskInput) -> Result<Task, ClientError>;

    /// `PATCH /tasks/{id}`
    async fn update_task(&self, id: &TaskId, input: &UpdateTaskInput)
    -> Result<Task, ClientError>;

    /// `DELETE /tasks/{id}`. Hard delete; a missing id is `ClientError::NotFound`.
    async fn delete_task(&self, id: &TaskId) -> Result<(), ClientError>;
}
