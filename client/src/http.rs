//! HTTP client abstraction.
//!
//! The orchestrator only needs three capabilities from a transport: open it,
//! issue a GET, and close it. [`HttpClient`] captures exactly that, so tests
//! and embedders can swap in their own transport. [`ReqwestClient`] is the
//! production implementation.

use std::future::Future;
use std::pin::Pin;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{CraftError, Result};

/// Boxed future returned by [`HttpClient`] methods.
pub type HttpFut<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Upper bound on how much of an error body is kept in [`CraftError::HttpStatus`].
const MAX_ERROR_BODY_BYTES: usize = 8 * 1024;

/// A fully buffered response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub url: String,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, lossily decoded.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Fails with [`CraftError::HttpStatus`] on any non-2xx status.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let mut body = self.text();
        if body.len() > MAX_ERROR_BODY_BYTES {
            let mut cut = MAX_ERROR_BODY_BYTES;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Err(CraftError::HttpStatus {
            status: self.status,
            url: self.url,
            body,
        })
    }
}

/// Transport used by a session.
///
/// `start` is called once before the first `get`, and `close` once after the
/// last. Implementations may assume that ordering; the session enforces it.
pub trait HttpClient: Send + Sync + 'static {
    fn start(&self) -> HttpFut<'_, ()>;

    fn get<'a>(&'a self, url: &'a Url) -> HttpFut<'a, HttpResponse>;

    fn close(&self) -> HttpFut<'_, ()>;
}

// ============================================================================
// reqwest
// ============================================================================

/// [`HttpClient`] backed by `reqwest`, sending the configured browser headers
/// with every request.
#[derive(Debug)]
pub struct ReqwestClient {
    headers: HeaderMap,
    timeout: Duration,
    inner: RwLock<Option<reqwest::Client>>,
}

impl ReqwestClient {
    /// Validates the configured headers; the connection pool is built on `start`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            headers: header_map(config.headers())?,
            timeout: config.timeout(),
            inner: RwLock::new(None),
        })
    }

    fn client(&self) -> Option<reqwest::Client> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl HttpClient for ReqwestClient {
    fn start(&self) -> HttpFut<'_, ()> {
        Box::pin(async move {
            let client = reqwest::Client::builder()
                .default_headers(self.headers.clone())
                .timeout(self.timeout)
                .build()
                .map_err(|e| CraftError::Transport {
                    url: String::new(),
                    message: format!("failed to build HTTP client: {e}"),
                })?;
            *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(client);
            tracing::debug!(timeout_secs = self.timeout.as_secs(), "HTTP client started");
            Ok(())
        })
    }

    fn get<'a>(&'a self, url: &'a Url) -> HttpFut<'a, HttpResponse> {
        Box::pin(async move {
            let client = self.client().ok_or(crate::SessionStateError::NotStarted)?;
            let transport = |e: reqwest::Error| CraftError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            };

            tracing::debug!(method = "GET", url = %url, "Sending request");
            let response = client.get(url.clone()).send().await.map_err(transport)?;

            let status = response.status().as_u16();
            let final_url = response.url().to_string();
            let body = response.bytes().await.map_err(transport)?.to_vec();

            tracing::debug!(
                status,
                url = %final_url,
                body = %String::from_utf8_lossy(&body),
                "Received response"
            );

            Ok(HttpResponse {
                status,
                url: final_url,
                body,
            })
        })
    }

    fn close(&self) -> HttpFut<'_, ()> {
        Box::pin(async move {
            // Dropping the last handle shuts the connection pool down.
            let dropped = self
                .inner
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if dropped.is_some() {
                tracing::debug!("HTTP client closed");
            }
            Ok(())
        })
    }
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| CraftError::invalid(format!("invalid header name '{name}': {e}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| CraftError::invalid(format!("invalid value for header '{name}': {e}")))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}
