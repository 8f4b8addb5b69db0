//! InMemoryTaskApi - 開発用・テスト用のリモートストア
//!
//! # 学習ポイント
//! - tokio::sync::Mutex で状態をまとめて保護
//! - oneshot チャネルで呼び出しを途中で止める（hold）
//! - 失敗の注入（fail_next）でエラー経路をテストする
//!
//! 一覧は新しい順（created_at DESC）で返します。

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{Mutex, oneshot};
use tracing::debug;

use crate::domain::{
    ClientError, CreateTaskInput, SearchQuery, SearchResponse, SearchResult, SortOrder, Task,
    TaskId, UpdateTaskInput,
};
use crate::ports::{Clock, IdGenerator, SearchApi, SystemClock, TaskApi, UlidGenerator};

const DEFAULT_SEARCH_LIMIT: u32 = 20;

/// InMemoryTaskApi が受け付ける操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    List,
    Get,
    Create,
    Update,
    Delete,
    Search,
    Reindex,
}

/// 操作ごとの呼び出し回数
///
/// 失敗した呼び出しも数えます。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApiCallCounts {
    pub list: u64,
    pub get: u64,
    pub create: u64,
    pub update: u64,
    pub delete: u64,
    pub search: u64,
    pub reindex: u64,
}

impl ApiCallCounts {
    fn bump(&mut self, op: ApiOperation) {
        let slot = match op {
            ApiOperation::List => &mut self.list,
            ApiOperation::Get => &mut self.get,
            ApiOperation::Create => &mut self.create,
            ApiOperation::Update => &mut self.update,
            ApiOperation::Delete => &mut self.delete,
            ApiOperation::Search => &mut self.search,
            ApiOperation::Reindex => &mut self.reindex,
        };
        *slot += 1;
    }
}

/// `hold` で止めた呼び出しを再開させるハンドル
///
/// release せずに drop しても呼び出しは再開します。
#[derive(Debug)]
pub struct HoldGate {
    tx: oneshot::Sender<()>,
}

impl HoldGate {
    pub fn release(self) {
        let _ = self.tx.send(());
    }
}

#[derive(Default)]
struct State {
    /// 新しい順
    tasks: Vec<Task>,
    calls: ApiCallCounts,
    failures: HashMap<ApiOperation, VecDeque<ClientError>>,
    holds: HashMap<ApiOperation, oneshot::Receiver<()>>,
}

impl State {
    fn position(&self, id: &TaskId) -> Result<usize, ClientError> {
        self.tasks
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| ClientError::NotFound("Task not found".into()))
    }
}

/// InMemoryTaskApi は TaskApi / SearchApi のインメモリ実装
///
/// # 使用例
/// ```ignore
/// let api = Arc::new(InMemoryTaskApi::new());
/// api.fail_next(ApiOperation::Create, ClientError::Transport("reset".into())).await;
/// let client = TaskClientBuilder::new().api(api.clone()).build()?;
/// ```
pub struct InMemoryTaskApi {
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
    ids: Box<dyn IdGenerator>,
}

impl InMemoryTaskApi {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// タイムスタンプと ID の時刻部分に `clock` を使う
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            ids: Box::new(UlidGenerator::new(Arc::clone(&clock))),
            clock,
        }
    }

    pub async fn call_counts(&self) -> ApiCallCounts {
        self.state.lock().await.calls
    }

    /// 次の `op` 呼び出しを `error` で失敗させる。複数回呼ぶと順に消費される。
    pub async fn fail_next(&self, op: ApiOperation, error: ClientError) {
        self.state
            .lock()
            .await
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// 次の `op` 呼び出しを、返された gate が release されるまで止める
    pub async fn hold(&self, op: ApiOperation) -> HoldGate {
        let (tx, rx) = oneshot::channel();
        self.state.lock().await.holds.insert(op, rx);
        HoldGate { tx }
    }

    /// 未完了のタスクを順に作成する（最後のものが一覧の先頭になる）
    pub async fn seed<I, S>(&self, texts: I) -> Vec<Task>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state.lock().await;
        let mut created = Vec::new();
        for text in texts {
            let text = text.as_ref().trim();
            if text.is_empty() {
                continue;
            }
            let task = self.new_task(text);
            state.tasks.insert(0, task.clone());
            created.push(task);
        }
        created
    }

    pub async fn snapshot(&self) -> Vec<Task> {
        self.state.lock().await.tasks.clone()
    }

    fn new_task(&self, text: &str) -> Task {
        let now = self.clock.now();
        Task {
            id: self.ids.generate_task_id(),
            text: text.to_string(),
            completed: false,
            created_at: now,
            updated_at: Some(now),
        }
    }

    /// 呼び出しの記録、hold の待機、注入された失敗の取り出し
    async fn enter(&self, op: ApiOperation) -> Result<(), ClientError> {
        let (hold, failure) = {
            let mut state = self.state.lock().await;
            state.calls.bump(op);
            let hold = state.holds.remove(&op);
            let failure = state.failures.get_mut(&op).and_then(VecDeque::pop_front);
            (hold, failure)
        };
        if let Some(hold) = hold {
            debug!(?op, "call held");
            // sender が drop されても再開する
            let _ = hold.await;
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryTaskApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskApi for InMemoryTaskApi {
    async fn list_tasks(&self, completed: bool) -> Result<Vec<Task>, ClientError> {
        self.enter(ApiOperation::List).await?;
        let state = self.state.lock().await;
        Ok(state
            .tasks
            .iter()
            .filter(|t| t.completed == completed)
            .cloned()
            .collect())
    }

    async fn get_task(&self, id: &TaskId) -> Result<Task, ClientError> {
        self.enter(ApiOperation::Get).await?;
        let state = self.state.lock().await;
        let index = state.position(id)?;
        Ok(state.tasks[index].clone())
    }

    async fn create_task(&self, input: &CreateTaskInput) -> Result<Task, ClientError> {
        self.enter(ApiOperation::Create).await?;
        let task = self.new_task(input.text());
        self.state.lock().await.tasks.insert(0, task.clone());
        Ok(task)
    }

    async fn update_task(
        &self,
        id: &TaskId,
        input: &UpdateTaskInput,
    ) -> Result<Task, ClientError> {
        self.enter(ApiOperation::Update).await?;
        if let Some(text) = &input.text
            && text.trim().is_empty()
        {
            return Err(ClientError::EmptyText);
        }
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let index = state.position(id)?;
        let task = &mut state.tasks[index];
        if let Some(text) = &input.text {
            task.text = text.trim().to_string();
        }
        if let Some(completed) = input.completed {
            task.completed = completed;
        }
        task.updated_at = Some(now);
        Ok(task.clone())
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), ClientError> {
        self.enter(ApiOperation::Delete).await?;
        let mut state = self.state.lock().await;
        let index = state.position(id)?;
        state.tasks.remove(index);
        Ok(())
    }
}

#[async_trait]
impl SearchApi for InMemoryTaskApi {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, ClientError> {
        self.enter(ApiOperation::Search).await?;
        let needle = query.q.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return Err(ClientError::Api {
                status: 400,
                message: "Search query is required".into(),
            });
        }

        let state = self.state.lock().await;
        let mut hits: Vec<SearchResult> = state
            .tasks
            .iter()
            .filter(|t| query.options.completed.is_none_or(|c| t.completed == c))
            .filter_map(|t| score(&t.text, &needle).map(|s| (t, s)))
            .map(|(t, score)| SearchResult {
                id: t.id.clone(),
                text: t.text.clone(),
                completed: t.completed,
                created_at: t.created_at,
                updated_at: t.updated_at,
                score,
                highlights: HashMap::from([("text".to_string(), vec![highlight(&t.text, &needle)])]),
            })
            .collect();
        drop(state);

        match query.options.sort.unwrap_or_default() {
            SortOrder::Relevance => hits.sort_by(|a, b| b.score.total_cmp(&a.score)),
            SortOrder::DateDesc => hits.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortOrder::DateAsc => hits.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        }

        let limit = query
            .options
            .limit
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_SEARCH_LIMIT);
        let offset = query.options.offset.unwrap_or(0);
        let total = hits.len() as u64;
        let results = hits
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();

        Ok(SearchResponse {
            results,
            total,
            page: offset / limit + 1,
            total_pages: u32::try_from(total.div_ceil(u64::from(limit))).unwrap_or(u32::MAX),
        })
    }

    async fn reindex(&self) -> Result<String, ClientError> {
        self.enter(ApiOperation::Reindex).await?;
        let count = self.state.lock().await.tasks.len();
        Ok(format!("Reindexed {count} tasks"))
    }
}

/// 一致部分が本文に占める割合。一致しなければ None
fn score(text: &str, needle: &str) -> Option<f64> {
    let haystack = text.to_ascii_lowercase();
    let matches = haystack.matches(needle).count();
    if matches == 0 {
        return None;
    }
    Some((matches * needle.len()) as f64 / haystack.len() as f64)
}

/// 一致部分を `<mark>` で囲む（ASCII の大文字小文字を無視）
fn highlight(text: &str, needle: &str) -> String {
    // to_ascii_lowercase はバイト位置を変えない
    let haystack = text.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;
    for (start, _) in haystack.match_indices(needle) {
        let end = start + needle.len();
        out.push_str(&text[last..start]);
        out.push_str("<mark>");
        out.push_str(&text[start..end]);
        out.push_str("</mark>");
        last = end;
    }
    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SearchOptions;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};

    fn clocked() -> (Arc<FixedClock>, InMemoryTaskApi) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 1, 26, 10, 0, 0).unwrap(),
        ));
        let api = InMemoryTaskApi::with_clock(clock.clone());
        (clock, api)
    }

    #[tokio::test]
    async fn list_is_newest_first_and_filtered() {
        let (clock, api) = clocked();
        let a = api.create_task(&CreateTaskInput::new("A").unwrap()).await.unwrap();
        clock.advance(chrono::Duration::seconds(1));
        let b = api.create_task(&CreateTaskInput::new("B").unwrap()).await.unwrap();
        clock.advance(chrono::Duration::seconds(1));
        let c = api.create_task(&CreateTaskInput::new("C").unwrap()).await.unwrap();

        api.update_task(&b.id, &UpdateTaskInput::completed(true))
            .await
            .unwrap();

        let active = api.list_tasks(false).await.unwrap();
        assert_eq!(active, vec![c, a]);
        let history = api.list_tasks(true).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, b.id);
        assert!(history[0].updated_at > Some(b.created_at));
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        let api = InMemoryTaskApi::new();
        let id = TaskId::new("missing");

        assert!(api.get_task(&id).await.unwrap_err().is_not_found());
        assert!(api.delete_task(&id).await.unwrap_err().is_not_found());
        assert!(
            api.update_task(&id, &UpdateTaskInput::completed(true))
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let api = InMemoryTaskApi::new();
        api.fail_next(ApiOperation::List, ClientError::Transport("first".into()))
            .await;
        api.fail_next(ApiOperation::List, ClientError::Transport("second".into()))
            .await;

        assert_eq!(
            api.list_tasks(false).await,
            Err(ClientError::Transport("first".into()))
        );
        assert_eq!(
            api.list_tasks(false).await,
            Err(ClientError::Transport("second".into()))
        );
        assert_eq!(api.list_tasks(false).await, Ok(vec![]));
        assert_eq!(api.call_counts().await.list, 3);
    }

    #[tokio::test]
    async fn held_call_resumes_on_release() {
        let api = Arc::new(InMemoryTaskApi::new());
        let gate = api.hold(ApiOperation::Create).await;

        let call = tokio::spawn({
            let api = Arc::clone(&api);
            async move { api.create_task(&CreateTaskInput::new("Walk").unwrap()).await }
        });
        while api.call_counts().await.create == 0 {
            tokio::task::yield_now().await;
        }
        assert!(api.snapshot().await.is_empty());

        gate.release();
        call.await.unwrap().unwrap();
        assert_eq!(api.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn search_filters_and_highlights() {
        let api = InMemoryTaskApi::new();
        let tasks = api.seed(["Buy milk", "Milk the cow", "Walk the dog"]).await;
        api.update_task(&tasks[1].id, &UpdateTaskInput::completed(true))
            .await
            .unwrap();

        let all = api.search(&SearchQuery::new("MILK")).await.unwrap();
        assert_eq!(all.total, 2);
        assert_eq!(all.page, 1);
        assert_eq!(all.total_pages, 1);

        let active = api
            .search(&SearchQuery::new("milk").with_options(SearchOptions {
                completed: Some(false),
                ..SearchOptions::default()
            }))
            .await
            .unwrap();
        assert_eq!(active.total, 1);
        assert_eq!(
            active.results[0].highlights["text"],
            vec!["Buy <mark>milk</mark>".to_string()]
        );
    }

    #[tokio::test]
    async fn search_pages_with_limit_and_offset() {
        let api = InMemoryTaskApi::new();
        api.seed((0..5).map(|i| format!("task {i}"))).await;

        let response = api
            .search(&SearchQuery::new("task").with_options(SearchOptions {
                limit: Some(2),
                offset: Some(2),
                ..SearchOptions::default()
            }))
            .await
            .unwrap();

        assert_eq!(response.total, 5);
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.page, 2);
        assert_eq!(response.total_pages, 3);
    }

    #[tokio::test]
    async fn blank_search_is_a_bad_request() {
        let api = InMemoryTaskApi::new();
        let err = api.search(&SearchQuery::new("  ")).await.unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 400, .. }));
    }

    #[test]
    fn highlight_keeps_original_case() {
        assert_eq!(
            highlight("Milk and milk", "milk"),
            "<mark>Milk</mark> and <mark>milk</mark>"
        );
    }
}
