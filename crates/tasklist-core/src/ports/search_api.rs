//! SearchApi port - 検索エンドポイント

use async_trait::async_trait;

use crate::domain::{ClientError, SearchQuery, SearchResponse};

#[async_trait]
pub trait SearchApi: Send + Sync {
    /// `GET /search?q=&completed=&sort=&limit=&offset=`
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, ClientError>;

    /// `POST /search/reindex`. Returns the server's message.
    async fn reindex(&self) -> Result<String, ClientError>;
}
