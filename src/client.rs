use std::time::{Duration, Instant};

use futures::stream::StreamExt;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, StatusCode};
use url::Url;

use crate::backend::StudioBackend;
use crate::chat::{DEFAULT_BACKEND_URL, StudioConfig};
use crate::decoder::ByteStream;
use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUESTS, CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS};
use crate::types::{ChatRequest, EbookList, EbookRecord, SaveEbookParams};

const CHAT_PATH: &str = "api/chat";
const LIST_PATH: &str = "api/ebook/list";
const SAVE_PATH: &str = "api/ebook/save";

/// HTTP client for the studio backend.
#[derive(Debug, Clone)]
pub struct StudioClient {
    client: ReqwestClient,
    base_url: Url,
    timeout: Option<Duration>,
}

impl StudioClient {
    /// Create a client for `base_url`, or the default local backend.
    ///
    /// No timeout is applied: a reply streams for as long as the backend
    /// keeps writing.
    pub fn new(base_url: Option<String>) -> Result<Self> {
        Self::with_options(base_url, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(base_url: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let base_url = parse_base_url(base_url.as_deref().unwrap_or(DEFAULT_BACKEND_URL))?;

        let mut builder = ReqwestClient::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {e}"),
                Some(Box::new(e)),
            )
        })?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// Create a client from a resolved configuration.
    pub fn from_config(config: &StudioConfig) -> Result<Self> {
        Self::with_options(Some(config.base_url.clone()), config.timeout)
    }

    /// The base URL endpoints are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                self.timeout.map(|t| t.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// Convert an unsuccessful response into a transport error.
    async fn process_error_response(response: Response) -> Error {
        let status = response.status();
        let reason = status.canonical_reason().unwrap_or("unexpected status");
        let message = match response.text().await {
            Ok(body) if !body.trim().is_empty() => format!("{reason}: {}", body.trim()),
            _ => reason.to_string(),
        };
        Error::transport(Some(status.as_u16()), message)
    }

    async fn execute(&self, request: reqwest::RequestBuilder, what: &str) -> Result<Response> {
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let result = request.send().await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                CLIENT_REQUEST_ERRORS.click();
                tracing::debug!(request = what, error = %e, "request failed");
                return Err(self.map_send_error(e));
            }
        };
        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            let err = Self::process_error_response(response).await;
            tracing::debug!(request = what, error = %err, "unsuccessful response");
            return Err(err);
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl StudioBackend for StudioClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ByteStream> {
        let url = self.endpoint(CHAT_PATH)?;
        let builder = self
            .client
            .post(url)
            .headers(self.default_headers())
            .json(request);
        let response = self.execute(builder, "chat").await?;

        if response.status() == StatusCode::NO_CONTENT {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Error::transport(
                Some(response.status().as_u16()),
                "response has no body",
            ));
        }

        tracing::debug!(history = request.history.len(), "chat stream opened");
        let stream = response.bytes_stream().map(|result| {
            result.map_err(|e| {
                Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e)))
            })
        });
        Ok(Box::pin(stream))
    }

    async fn list_ebooks(&self) -> Result<Vec<EbookRecord>> {
        let url = self.endpoint(LIST_PATH)?;
        let response = self.execute(self.client.get(url), "list").await?;
        let list = response.json::<EbookList>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse ebook list: {e}"),
                Some(Box::new(e)),
            )
        })?;
        Ok(list.items)
    }

    async fn save_ebook(&self, params: &SaveEbookParams) -> Result<()> {
        let url = self.endpoint(SAVE_PATH)?;
        let builder = self
            .client
            .post(url)
            .headers(self.default_headers())
            .json(params);
        self.execute(builder, "save").await?;
        Ok(())
    }
}

/// Parse a base URL so that relative endpoint paths append to it.
fn parse_base_url(base_url: &str) -> Result<Url> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(
            "base URL must not be empty",
            Some("base_url".to_string()),
        ));
    }
    let mut url = Url::parse(trimmed)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
