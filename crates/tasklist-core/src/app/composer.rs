//! TaskComposer - タスク入力欄（submission surface）
//!
//! create の再入防止は呼び出し側の責務なので、TaskClient ではなくここで行います。
//! - 送信中は `Busy` を返して二重送信を受け付けない
//! - 成功時のみ入力をクリア、失敗時は入力を残す（ユーザーが再送できる）

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::client::TaskClient;
use crate::domain::{ClientError, Task};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created(Task),
    /// Text was blank; create was not invoked.
    Ignored,
    /// A previous submit is still in flight.
    Busy,
}

pub struct TaskComposer {
    client: Arc<TaskClient>,
    text: Mutex<String>,
    pending: AtomicBool,
}

/// Clears the pending flag even if the submit future is dropped.
struct PendingReset<'a>(&'a AtomicBool);

impl Drop for PendingReset<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl TaskComposer {
    pub fn new(client: Arc<TaskClient>) -> Self {
        Self {
            client,
            text: Mutex::new(String::new()),
            pending: AtomicBool::new(false),
        }
    }

    pub fn text(&self) -> String {
        self.text.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Replace the input text. Rejected (returns `false`) while a submit is
    /// in flight, like a disabled input.
    pub fn set_text(&self, text: impl Into<String>) -> bool {
        if self.is_pending() {
            return false;
        }
        *self.text.lock().unwrap_or_else(|e| e.into_inner()) = text.into();
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    pub async fn submit(&self) -> Result<SubmitOutcome, ClientError> {
        let text = self.text();
        if text.trim().is_empty() {
            return Ok(SubmitOutcome::Ignored);
        }
        if self.pending.swap(true, Ordering::AcqRel) {
            debug!("submit ignored, previous create still pending");
            return Ok(SubmitOutcome::Busy);
        }
        let _reset = PendingReset(&self.pending);

        let task = self.client.create_task(&text).await?;
        self.text.lock().unwrap_or_else(|e| e.into_inner()).clear();
        Ok(SubmitOutcome::Created(task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::TaskClientBuilder;
    use crate::domain::View;
    use crate::impls::{ApiOperation, InMemoryTaskApi};

    fn setup() -> (Arc<InMemoryTaskApi>, Arc<TaskClient>, TaskComposer) {
        let api = Arc::new(InMemoryTaskApi::new());
        let client = Arc::new(TaskClientBuilder::new().api(api.clone()).build().unwrap());
        let composer = TaskComposer::new(Arc::clone(&client));
        (api, client, composer)
    }

    #[tokio::test]
    async fn successful_submit_clears_text() {
        let (_api, client, composer) = setup();
        composer.set_text("  Buy milk ");

        let outcome = composer.submit().await.unwrap();

        let SubmitOutcome::Created(task) = outcome else {
            panic!("expected Created, got {outcome:?}");
        };
        assert_eq!(task.text, "Buy milk");
        assert_eq!(composer.text(), "");
        assert_eq!(client.list_tasks(View::Active).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_submit_keeps_text() {
        let (api, _client, composer) = setup();
        api.fail_next(
            ApiOperation::Create,
            ClientError::Api {
                status: 500,
                message: "Failed to create task".into(),
            },
        )
        .await;
        composer.set_text("Buy milk");

        assert!(composer.submit().await.is_err());
        assert_eq!(composer.text(), "Buy milk");
        assert!(!composer.is_pending());
    }

    #[tokio::test]
    async fn blank_text_is_ignored() {
        let (api, client, composer) = setup();
        composer.set_text("   ");

        assert_eq!(composer.submit().await.unwrap(), SubmitOutcome::Ignored);
        assert_eq!(api.call_counts().await.create, 0);
        assert!(client.list_tasks(View::Active).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_submit_while_pending_is_busy() {
        let (api, _client, composer) = setup();
        let gate = api.hold(ApiOperation::Create).await;
        composer.set_text("Buy milk");

        let composer = Arc::new(composer);
        let first = tokio::spawn({
            let composer = Arc::clone(&composer);
            async move { composer.submit().await }
        });
        while !composer.is_pending() {
            tokio::task::yield_now().await;
        }

        assert_eq!(composer.submit().await.unwrap(), SubmitOutcome::Busy);
        assert!(!composer.set_text("other"));

        gate.release();
        assert!(matches!(
            first.await.unwrap().unwrap(),
            SubmitOutcome::Created(_)
        ));
        assert_eq!(api.call_counts().await.create, 1);
    }
}
