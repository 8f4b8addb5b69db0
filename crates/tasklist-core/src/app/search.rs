//! SearchSession - debounce 付き検索
//!
//! # 学習ポイント
//! - `JoinHandle::abort` による遅延呼び出しのキャンセル
//! - `tokio::sync::watch` で最新状態だけを購読者に配る
//!
//! # ポリシー
//! - 入力が `min_query_len` 文字未満なら即座に NoQuery（ネットワークに出ない）
//! - それ以外は `debounce` の間入力が変わらなければ検索する
//! - 新しい入力は保留中の呼び出しをキャンセルする

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::{QueryCache, RetryPolicy};
use crate::config::ClientConfig;
use crate::domain::{ClientError, SearchOptions, SearchQuery, SearchResponse};
use crate::ports::SearchApi;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum SearchState {
    /// Query too short (or empty); nothing requested.
    #[default]
    NoQuery,
    /// Waiting for the debounce delay or the response.
    Pending { query: String },
    Ready {
        query: String,
        response: Arc<SearchResponse>,
    },
    Failed { query: String, error: ClientError },
}

struct SearchInner {
    api: Arc<dyn SearchApi>,
    cache: QueryCache<SearchQuery, SearchResponse>,
    retry: RetryPolicy,
    options: SearchOptions,
    state: watch::Sender<SearchState>,
    /// Bumped by every input; only the latest search may publish.
    latest: AtomicU64,
}

impl SearchInner {
    fn next_seq(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Publish `next` unless a newer input has arrived since `seq`.
    fn publish(&self, seq: u64, next: SearchState) -> bool {
        self.state.send_if_modified(|state| {
            if self.latest.load(Ordering::Acquire) != seq {
                return false;
            }
            *state = next;
            true
        })
    }

    async fn run(&self, seq: u64, query: String) -> Result<Arc<SearchResponse>, ClientError> {
        let key = SearchQuery::new(query.clone()).with_options(self.options.clone());
        let api = &self.api;
        let retry = &self.retry;
        let request = key.clone();
        let result = self
            .cache
            .get_or_fetch(key, move || async move {
                let request = &request;
                retry.run("search", move || api.search(request)).await
            })
            .await;

        let next = match &result {
            Ok(response) => SearchState::Ready {
                query,
                response: Arc::clone(response),
            },
            Err(error) => SearchState::Failed {
                query,
                error: error.clone(),
            },
        };
        if !self.publish(seq, next) {
            debug!("search superseded by newer input, result dropped");
        }
        result
    }
}

/// Debounced search over a `SearchApi`.
///
/// `update` spawns onto the current tokio runtime.
pub struct SearchSession {
    inner: Arc<SearchInner>,
    debounce: Duration,
    min_query_len: usize,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl SearchSession {
    pub fn new(api: Arc<dyn SearchApi>, options: SearchOptions) -> Self {
        Self::with_config(api, options, &ClientConfig::default())
    }

    pub fn with_config(api: Arc<dyn SearchApi>, options: SearchOptions, config: &ClientConfig) -> Self {
        let (state, _) = watch::channel(SearchState::NoQuery);
        Self {
            inner: Arc::new(SearchInner {
                api,
                cache: QueryCache::new(config.stale_time()),
                retry: config.retry_policy(),
                options,
                state,
                latest: AtomicU64::new(0),
            }),
            debounce: config.search_debounce(),
            min_query_len: config.search_min_query_len,
            pending: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> SearchState {
        self.inner.state.borrow().clone()
    }

    fn cancel_pending(&self) {
        let handle = self.pending.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    fn is_searchable(&self, query: &str) -> bool {
        query.trim().chars().count() >= self.min_query_len
    }

    /// Record a new input value. Cancels any pending delayed search.
    pub fn update(&self, query: impl Into<String>) {
        let query = query.into();
        self.cancel_pending();
        let seq = self.inner.next_seq();

        if !self.is_searchable(&query) {
            self.inner.publish(seq, SearchState::NoQuery);
            return;
        }

        self.inner.publish(
            seq,
            SearchState::Pending {
                query: query.clone(),
            },
        );

        let inner = Arc::clone(&self.inner);
        let debounce = self.debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            debug!(query = %query, "debounce elapsed, searching");
            // 結果は watch チャネル経由で届く
            let _ = inner.run(seq, query).await;
        });
        *self.pending.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Search immediately, skipping the debounce. Short queries resolve to
    /// an empty response without a request.
    pub async fn search_now(&self, query: impl Into<String>) -> Result<Arc<SearchResponse>, ClientError> {
        let query = query.into();
        self.cancel_pending();
        let seq = self.inner.next_seq();

        if !self.is_searchable(&query) {
            self.inner.publish(seq, SearchState::NoQuery);
            return Ok(Arc::new(SearchResponse::default()));
        }
        self.inner.publish(
            seq,
            SearchState::Pending {
                query: query.clone(),
            },
        );
        self.inner.run(seq, query).await
    }
}

impl Drop for SearchSession {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
