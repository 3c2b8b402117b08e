//! Google Drive v3 implementation of [`RemoteStore`].

use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::{RequestBuilder, Response, StatusCode};
use tracing::{debug, instrument, warn};

use crate::auth::{Credentials, TokenProvider};
use crate::error::{RemoteError, Result};
use crate::store::{ByteStream, RemoteStore};
use crate::types::{FilesListResponse, RemoteFilePage};

const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Maximum results per page accepted by `files.list`.
const MAX_PAGE_SIZE: u32 = 1000;

const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, modifiedTime, md5Checksum)";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const LIST_TIMEOUT: Duration = Duration::from_secs(30);
/// Longest silence tolerated between two reads of a response body.
pub const READ_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_LIST_ATTEMPTS: u32 = 3;

/// Read-only Drive client scoped to listing and downloading folder children.
pub struct DriveClient {
    http: reqwest::Client,
    tokens: TokenProvider,
    base_url: String,
}

impl DriveClient {
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_read_timeout(credentials, READ_TIMEOUT)
    }

    /// Like [`DriveClient::new`], failing any transfer that stalls for longer
    /// than `read_timeout`.
    pub fn with_read_timeout(credentials: Credentials, read_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(read_timeout)
            .user_agent(concat!("drive-kiosk/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            tokens: TokenProvider::new(credentials, http.clone()),
            http,
            base_url: DRIVE_API_BASE.to_string(),
        })
    }

    /// Point the client at a different API root, e.g. a local test server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.tokens.access_token().await?;
        Ok(request.bearer_auth(token))
    }

    fn list_request(&self, folder_id: &str, page_token: Option<&str>) -> RequestBuilder {
        let page_size = MAX_PAGE_SIZE.to_string();
        let query = folder_query(folder_id);
        let mut params: Vec<(&str, &str)> = vec![
            ("q", query.as_str()),
            ("pageSize", page_size.as_str()),
            ("fields", LIST_FIELDS),
            ("supportsAllDrives", "true"),
            ("includeItemsFromAllDrives", "true"),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        self.http
            .get(format!("{}/files", self.base_url))
            .query(&params)
            .timeout(LIST_TIMEOUT)
    }
}

/// Drive search expression selecting the non-trashed children of a folder.
pub fn folder_query(folder_id: &str) -> String {
    let escaped = folder_id.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}' in parents and trashed = false")
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Api {
        status: status.as_u16(),
        message: body.trim().to_string(),
    })
}

#[async_trait]
impl RemoteStore for DriveClient {
    #[instrument(skip(self), fields(page = page_token.is_some()))]
    async fn list_page(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<RemoteFilePage> {
        let mut attempt = 0;
        let response = loop {
            attempt += 1;
            let request = self
                .authorized(self.list_request(folder_id, page_token))
                .await?;
            let response = request.send().await?;
            let status = response.status();
            if is_retryable(status) && attempt < MAX_LIST_ATTEMPTS {
                let backoff = Duration::from_millis(250 * 2u64.pow(attempt));
                warn!(%status, attempt, ?backoff, "listing request failed; retrying");
                tokio::time::sleep(backoff).await;
                continue;
            }
            break ensure_success(response).await?;
        };

        let body: FilesListResponse = response
            .json()
            .await
            .map_err(|err| RemoteError::Parse(format!("files.list response: {err}")))?;
        let page = RemoteFilePage::from(body);
        debug!(
            entries = page.entries.len(),
            more = page.next_page_token.is_some(),
            "listed page"
        );
        Ok(page)
    }

    #[instrument(skip(self))]
    async fn download(&self, file_id: &str) -> Result<ByteStream> {
        let url = format!(
            "{}/files/{}",
            self.base_url,
            urlencoding::encode(file_id)
        );
        let request = self
            .http
            .get(url)
            .query(&[("alt", "media"), ("supportsAllDrives", "true")]);
        let response = self.authorized(request).await?.send().await?;
        let response = ensure_success(response).await?;
        Ok(response
            .bytes_stream()
            .map_err(RemoteError::from)
            .boxed())
    }
}
