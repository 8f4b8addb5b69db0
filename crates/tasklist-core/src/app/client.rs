//! TaskClient - クエリとミューテーションの合成
//!
//! # フロー
//! - 読み取り: View をキーに QueryCache を引く → miss なら TaskApi::list_tasks（1 回だけリトライ）
//! - 書き込み: TaskApi を呼ぶ → 成功時のみ影響する View を invalidate
//!
//! | mutation | 成功時に invalidate する View |
//! |----------|------------------------------|
//! | create   | Active                       |
//! | toggle   | Active と History の両方      |
//! | delete   | 呼び出し側が操作している View  |
//!
//! 失敗時はキャッシュに一切触れません（stale でも一貫した View を優先）。

use std::sync::Arc;

use tracing::{info, warn};

use super::status::{MutationKind, MutationStatus, MutationTracker, QueryStatus};
use crate::cache::{QueryCache, RetryPolicy};
use crate::domain::{ClientError, CreateTaskInput, Task, TaskId, UpdateTaskInput, View};
use crate::ports::TaskApi;

/// The task query/mutation layer.
///
/// Owns its cache; nothing is shared through globals. Cheap to put behind
/// an `Arc` and share between callers.
pub struct TaskClient {
    api: Arc<dyn TaskApi>,
    views: QueryCache<View, Vec<Task>>,
    retry: RetryPolicy,
    mutations: MutationTracker,
}

impl TaskClient {
    pub(crate) fn new(api: Arc<dyn TaskApi>, views: QueryCache<View, Vec<Task>>, retry: RetryPolicy) -> Self {
        Self {
            api,
            views,
            retry,
            mutations: MutationTracker::new(),
        }
    }

    /// Tasks of `view`, in server order.
    ///
    /// A fresh cached list is returned without a network call.
    pub async fn list_tasks(&self, view: View) -> Result<Arc<Vec<Task>>, ClientError> {
        let api = &self.api;
        let retry = &self.retry;
        let completed = view.completed();
        self.views
            .get_or_fetch(view, move || async move {
                retry
                    .run("list_tasks", move || api.list_tasks(completed))
                    .await
            })
            .await
    }

    pub async fn list_tasks_completed(&self, completed: bool) -> Result<Arc<Vec<Task>>, ClientError> {
        self.list_tasks(View::from_completed(completed)).await
    }

    /// Whatever is cached for `view`, without touching the network.
    pub fn cached_tasks(&self, view: View) -> Option<Arc<Vec<Task>>> {
        self.views.peek(&view)
    }

    pub fn view_status(&self, view: View) -> QueryStatus {
        self.views.status(&view)
    }

    pub fn mutation_status(&self, kind: MutationKind) -> MutationStatus {
        self.mutations.status(kind)
    }

    /// Uncached single-task lookup.
    pub async fn get_task(&self, id: &TaskId) -> Result<Task, ClientError> {
        self.api.get_task(id).await
    }

    /// Create a task from `text` (trimmed).
    ///
    /// Blank text fails with `ClientError::EmptyText` before any network call.
    pub async fn create_task(&self, text: &str) -> Result<Task, ClientError> {
        let input = CreateTaskInput::new(text)?;
        let guard = self.mutations.begin(MutationKind::Create);

        let result = self.api.create_task(&input).await;
        match &result {
            Ok(task) => {
                info!(task_id = %task.id, "task created");
                self.views.invalidate(&View::Active);
            }
            Err(e) => warn!(error = %e, "create failed"),
        }
        guard.finish(&result);
        result
    }

    /// Set `completed` on a task.
    ///
    /// The task leaves one view and enters the other, so both are invalidated.
    pub async fn toggle_task(&self, id: &TaskId, completed: bool) -> Result<Task, ClientError> {
        let guard = self.mutations.begin(MutationKind::Toggle);

        let result = self
            .api
            .update_task(id, &UpdateTaskInput::completed(completed))
            .await;
        match &result {
            Ok(_) => {
                info!(task_id = %id, completed, "task toggled");
                for view in View::ALL {
                    self.views.invalidate(&view);
                }
            }
            Err(e) => warn!(task_id = %id, completed, error = %e, "toggle failed"),
        }
        guard.finish(&result);
        result
    }

    pub async fn complete_task(&self, id: &TaskId) -> Result<Task, ClientError> {
        self.toggle_task(id, true).await
    }

    /// Move a completed task back to the active view.
    pub async fn restore_task(&self, id: &TaskId) -> Result<Task, ClientError> {
        self.toggle_task(id, false).await
    }

    /// Hard-delete a task that the caller sees in `view`.
    ///
    /// Only `view` is invalidated. A second delete of the same id is
    /// `ClientError::NotFound` (see `ClientError::is_not_found`).
    pub async fn delete_task(&self, id: &TaskId, view: View) -> Result<(), ClientError> {
        let guard = self.mutations.begin(MutationKind::Delete);

        let result = self.api.delete_task(id).await;
        match &result {
            Ok(()) => {
                info!(task_id = %id, view = %view, "task deleted");
                self.views.invalidate(&view);
            }
            Err(e) if e.is_not_found() => warn!(task_id = %id, "delete: task already gone"),
            Err(e) => warn!(task_id = %id, error = %e, "delete failed"),
        }
        guard.finish(&result);
        result
    }

    pub fn invalidate(&self, view: View) {
        self.views.invalidate(&view);
    }

    pub fn invalidate_all(&self) {
        self.views.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::TaskClientBuilder;
    use crate::impls::{ApiOperation, InMemoryTaskApi};

    fn setup() -> (Arc<InMemoryTaskApi>, TaskClient) {
        let api = Arc::new(InMemoryTaskApi::new());
        let client = TaskClientBuilder::new().api(api.clone()).build().unwrap();
        (api, client)
    }

    #[tokio::test]
    async fn create_invalidates_active_only() {
        let (api, client) = setup();
        client.list_tasks(View::Active).await.unwrap();
        client.list_tasks(View::History).await.unwrap();

        client.create_task("Buy milk").await.unwrap();
        client.list_tasks(View::Active).await.unwrap();
        client.list_tasks(View::History).await.unwrap();

        let calls = api.call_counts().await;
        // Active: 初回 + create 後の再取得, History: 初回のみ
        assert_eq!(calls.list, 3);
    }

    #[tokio::test]
    async fn toggle_invalidates_both_views() {
        let (api, client) = setup();
        let task = client.create_task("Buy milk").await.unwrap();
        client.list_tasks(View::Active).await.unwrap();
        client.list_tasks(View::History).await.unwrap();
        let before = api.call_counts().await.list;

        client.toggle_task(&task.id, true).await.unwrap();
        client.list_tasks(View::Active).await.unwrap();
        client.list_tasks(View::History).await.unwrap();

        assert_eq!(api.call_counts().await.list, before + 2);
    }

    #[tokio::test]
    async fn failed_toggle_leaves_cache_untouched() {
        let (api, client) = setup();
        let task = client.create_task("Buy milk").await.unwrap();
        client.list_tasks(View::Active).await.unwrap();
        client.list_tasks(View::History).await.unwrap();
        let before = api.call_counts().await.list;

        api.fail_next(ApiOperation::Update, ClientError::Transport("reset".into()))
            .await;
        let result = client.toggle_task(&task.id, true).await;
        assert!(result.is_err());

        let active = client.list_tasks(View::Active).await.unwrap();
        client.list_tasks(View::History).await.unwrap();
        assert_eq!(api.call_counts().await.list, before);
        assert_eq!(active.len(), 1);
        assert!(matches!(
            client.mutation_status(MutationKind::Toggle),
            MutationStatus::Error(_)
        ));
    }

    #[tokio::test]
    async fn mutations_are_not_retried() {
        let (api, client) = setup();
        api.fail_next(ApiOperation::Create, ClientError::Transport("reset".into()))
            .await;

        let result = client.create_task("Buy milk").await;

        assert_eq!(result, Err(ClientError::Transport("reset".into())));
        assert_eq!(api.call_counts().await.create, 1);
    }

    #[tokio::test]
    async fn delete_invalidates_given_view_only() {
        let (api, client) = setup();
        let task = client.create_task("Buy milk").await.unwrap();
        client.list_tasks(View::Active).await.unwrap();
        client.list_tasks(View::History).await.unwrap();
        let before = api.call_counts().await.list;

        client.delete_task(&task.id, View::Active).await.unwrap();
        client.list_tasks(View::Active).await.unwrap();
        client.list_tasks(View::History).await.unwrap();

        assert_eq!(api.call_counts().await.list, before + 1);
    }

    #[tokio::test]
    async fn blank_text_never_reaches_the_api() {
        let (api, client) = setup();

        let result = client.create_task("   ").await;

        assert_eq!(result, Err(ClientError::EmptyText));
        assert_eq!(api.call_counts().await.create, 0);
        assert_eq!(client.mutation_status(MutationKind::Create), MutationStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn read_is_retried_once_then_reported() {
        let (api, client) = setup();
        api.fail_next(ApiOperation::List, ClientError::Transport("reset".into()))
            .await;
        api.fail_next(ApiOperation::List, ClientError::Transport("reset".into()))
            .await;

        let result = client.list_tasks(View::Active).await;

        assert!(result.is_err());
        assert_eq!(api.call_counts().await.list, 2);
        assert!(client.view_status(View::Active).error().is_some());
    }

    #[tokio::test]
    async fn get_task_is_forwarded() {
        let (_api, client) = setup();
        let task = client.create_task("Walk").await.unwrap();

        assert_eq!(client.get_task(&task.id).await.unwrap(), task);
        assert!(
            client
                .get_task(&TaskId::new("missing"))
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn completed_flag_maps_to_view_cache() {
        let (api, client) = setup();
        let task = client.create_task("Buy milk").await.unwrap();
        client.complete_task(&task.id).await.unwrap();

        let history = client.list_tasks_completed(true).await.unwrap();
        let active = client.list_tasks_completed(false).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(active.is_empty());
        let before = api.call_counts().await.list;

        // 同じキャッシュエントリを共有する
        assert_eq!(client.list_tasks(View::History).await.unwrap(), history);
        assert_eq!(client.list_tasks(View::Active).await.unwrap(), active);
        assert_eq!(api.call_counts().await.list, before);
    }

    #[tokio::test]
    async fn cached_tasks_never_touches_the_network() {
        let (api, client) = setup();
        assert_eq!(client.cached_tasks(View::Active), None);

        client.create_task("Buy milk").await.unwrap();
        let listed = client.list_tasks(View::Active).await.unwrap();
        client.invalidate(View::Active);
        let before = api.call_counts().await.list;

        assert_eq!(client.cached_tasks(View::Active), Some(listed));
        assert_eq!(client.cached_tasks(View::History), None);
        assert_eq!(api.call_counts().await.list, before);
    }

    #[tokio::test]
    async fn aborted_read_does_not_stay_loading() {
        let (api, client) = setup();
        let client = Arc::new(client);
        let gate = api.hold(ApiOperation::List).await;

        let read = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.list_tasks(View::Active).await }
        });
        while api.call_counts().await.list == 0 {
            tokio::task::yield_now().await;
        }
        assert!(client.view_status(View::Active).is_loading());

        read.abort();
        assert!(read.await.unwrap_err().is_cancelled());
        assert_eq!(client.view_status(View::Active), QueryStatus::Idle);
        drop(gate);
    }
}
