use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::SyncError;
use super::types::{
    BoardRecord, CasePatch, CaseRecord, ColumnPatch, ColumnRecord, CreateColumnRequest,
    MoveCaseRequest,
};
use super::BoardService;
use crate::model::{BoardId, CardId, ColumnId};

/// [`BoardService`] over the persistence service's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpBoardService {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpBoardService {
    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, SyncError> {
        Self::with_timeouts(
            base_url,
            api_key,
            Duration::from_secs(10),
            Duration::from_secs(30),
        )
    }

    pub fn with_timeouts(
        base_url: impl Into<String>,
        api_key: Option<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, SyncError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "remote call");
        let mut req = self.client.request(method, &url);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, SyncError> {
        let response = Self::check_status(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn check_status(response: Response) -> Result<Response, SyncError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        Err(match status {
            StatusCode::NOT_FOUND => SyncError::NotFound(message),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SyncError::Unauthorized,
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => SyncError::Timeout,
            _ => SyncError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }
}

impl BoardService for HttpBoardService {
    async fn fetch_board(&self, board: &BoardId) -> Result<BoardRecord, SyncError> {
        let response = self
            .request(Method::GET, &format!("/boards/{board}"))
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn move_case(&self, case: &CardId, body: &MoveCaseRequest) -> Result<(), SyncError> {
        let response = self
            .request(Method::PUT, &format!("/cases/{case}/move"))
            .json(body)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn update_case(
        &self,
        case: &CardId,
        patch: &CasePatch,
    ) -> Result<CaseRecord, SyncError> {
        let response = self
            .request(Method::PATCH, &format!("/cases/{case}"))
            .json(patch)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn escalate_case(&self, case: &CardId) -> Result<CaseRecord, SyncError> {
        let response = self
            .request(Method::POST, &format!("/cases/{case}/escalate"))
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn deescalate_case(&self, case: &CardId) -> Result<(), SyncError> {
        let response = self
            .request(Method::POST, &format!("/cases/{case}/deescalate"))
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn update_column(
        &self,
        board: &BoardId,
        column: &ColumnId,
        patch: &ColumnPatch,
    ) -> Result<ColumnRecord, SyncError> {
        let response = self
            .request(
                Method::PATCH,
                &format!("/boards/{board}/columns/{column}"),
            )
            .json(patch)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn delete_column(&self, board: &BoardId, column: &ColumnId) -> Result<(), SyncError> {
        let response = self
            .request(
                Method::DELETE,
                &format!("/boards/{board}/columns/{column}"),
            )
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn create_column(
        &self,
        board: &BoardId,
        body: &CreateColumnRequest,
    ) -> Result<ColumnRecord, SyncError> {
        let response = self
            .request(Method::POST, &format!("/boards/{board}/columns"))
            .json(body)
            .send()
            .await?;
        Self::handle_response(response).await
    }
}
