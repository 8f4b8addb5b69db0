//! HttpTaskApi - REST バックエンド向けの TaskApi / SearchApi 実装
//!
//! 成功レスポンスは `{"data": ...}`、エラーは `{"error": "..."}` で包まれています。

use std::fmt;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::{ClientConfig, UpdateMethod};
use crate::domain::{
    ClientError, CreateTaskInput, SearchQuery, SearchResponse, Task, TaskId, UpdateTaskInput,
};
use crate::ports::{SearchApi, TaskApi};

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Default, Deserialize)]
struct MessageBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

pub struct HttpTaskApi {
    client: reqwest::Client,
    base_url: Url,
    update_method: UpdateMethod,
}

impl fmt::Debug for HttpTaskApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTaskApi")
            .field("base_url", &self.base_url.as_str())
            .field("update_method", &self.update_method)
            .finish_non_exhaustive()
    }
}

impl HttpTaskApi {
    /// Client for `base_url` (e.g. `http://localhost:8080/api/v1`) with defaults.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::from_config(&ClientConfig {
            api_url: base_url.to_string(),
            ..ClientConfig::default()
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let base_url = Url::parse(&config.api_url)
            .map_err(|e| ClientError::Config(format!("api_url '{}': {e}", config.api_url)))?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::Config(format!("http client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            update_method: config.update_method,
        })
    }

    /// `base_url` + path segments; each segment is percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                ClientError::Config(format!("api_url '{}' cannot be a base", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<String, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let status = response.status();
        let url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        debug!(%url, status = status.as_u16(), "http response");

        if status.is_success() {
            return Ok(body);
        }
        let message = error_message(status, &body);
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(message));
        }
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn fetch_data<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let body = self.execute(request).await?;
        let envelope: DataEnvelope<T> =
            serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(envelope.data)
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    let parsed: MessageBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .error
        .or(parsed.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        })
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn list_tasks(&self, completed: bool) -> Result<Vec<Task>, ClientError> {
        let url = self.endpoint(&["tasks"])?;
        debug!(%url, completed, "GET tasks");
        self.fetch_data(self.client.get(url).query(&[("completed", completed)]))
            .await
    }

    async fn get_task(&self, id: &TaskId) -> Result<Task, ClientError> {
        let url = self.endpoint(&["tasks", id.as_str()])?;
        self.fetch_data(self.client.get(url)).await
    }

    async fn create_task(&self, input: &CreateTaskInput) -> Result<Task, ClientError> {
        let url = self.endpoint(&["tasks"])?;
        debug!(%url, "POST task");
        self.fetch_data(self.client.post(url).json(input)).await
    }

    async fn update_task(
        &self,
        id: &TaskId,
        input: &UpdateTaskInput,
    ) -> Result<Task, ClientError> {
        let url = self.endpoint(&["tasks", id.as_str()])?;
        let method = match self.update_method {
            UpdateMethod::Patch => Method::PATCH,
            UpdateMethod::Put => Method::PUT,
        };
        debug!(%url, %method, "update task");
        self.fetch_data(self.client.request(method, url).json(input))
            .await
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), ClientError> {
        let url = self.endpoint(&["tasks", id.as_str()])?;
        debug!(%url, "DELETE task");
        // 本文（204 の空 / 200 の message）は使わない
        self.execute(self.client.delete(url)).await.map(|_| ())
    }
}

#[async_trait]
impl SearchApi for HttpTaskApi {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, ClientError> {
        let url = self.endpoint(&["search"])?;
        debug!(%url, q = %query.q, "GET search");
        self.fetch_data(self.client.get(url).query(&query.to_query_pairs()))
            .await
    }

    async fn reindex(&self) -> Result<String, ClientError> {
        let url = self.endpoint(&["search", "reindex"])?;
        let body = self.execute(self.client.post(url)).await?;
        let parsed: MessageBody =
            serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(parsed.message.unwrap_or_default())
    }
}
