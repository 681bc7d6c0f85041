//! Notice index client with rate limiting and retries. Every request bypasses caches.

use reqwest::header::{CACHE_CONTROL, PRAGMA};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

const DEFAULT_GRAPHQL_URL: &str = "http://localhost:4000/graphql";
const RATE_LIMIT_MS: u64 = 100;
const MAX_RETRIES: u32 = 3;
const RETRY_BACKOFF_MS: u64 = 500;
const TIMEOUT_SECS: u64 = 30;
const MAX_RETRY_DELAY_MS: u64 = 30_000;

const NOTICE_QUERY: &str = r#"query getNoticeByInputIndex($inputIndex: String, $epochIndex: String) {
  GetNotice(query: { input_index: $inputIndex, epoch_index: $epochIndex }) {
    payload
    session_id
    notice_index
  }
}"#;

#[derive(Clone, Debug)]
pub struct IndexConfig {
    pub base_url: String,
    /// Minimum spacing between two requests of the same client, across all callers.
    pub rate_limit_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GRAPHQL_URL.to_string(),
            rate_limit_ms: RATE_LIMIT_MS,
            max_retries: MAX_RETRIES,
            retry_backoff_ms: RETRY_BACKOFF_MS,
            timeout_secs: TIMEOUT_SECS,
        }
    }
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("request: {0}")]
    Request(#[from] reqwest::Error),
    #[error("url: {0}")]
    Url(#[from] url::ParseError),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("api error: status {0} body {1}")]
    Api(u16, String),
    #[error("graphql: {0}")]
    GraphQl(String),
}

/// Lookup key of a notice: the epoch and the input's position, as decimal strings.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoticeKeys {
    pub epoch_index: String,
    pub input_index: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    /// Hex payload, usually without `0x`.
    pub payload: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub notice_index: Option<String>,
}

#[derive(Serialize)]
struct GraphQlRequest<'a, V> {
    #[serde(rename = "operationName")]
    operation_name: &'a str,
    query: &'a str,
    variables: V,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NoticeVariables<'a> {
    input_index: &'a str,
    epoch_index: &'a str,
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct NoticeData {
    #[serde(rename = "GetNotice", default)]
    get_notice: Option<Vec<Notice>>,
}

/// `backoff_ms * 2^attempt`, capped at [`MAX_RETRY_DELAY_MS`].
fn retry_delay_ms(backoff_ms: u64, attempt: u32) -> u64 {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    backoff_ms.saturating_mul(factor).min(MAX_RETRY_DELAY_MS)
}

/// Client for the notice index. Share it (e.g. in an `Arc`) so that all pollers
/// go through one rate limiter.
pub struct NoticeIndexClient {
    config: IndexConfig,
    endpoint: Url,
    client: reqwest::Client,
    last_request: Mutex<Option<Instant>>,
    request_count: AtomicU64,
}

impl NoticeIndexClient {
    pub fn new(config: IndexConfig) -> Result<Self, IndexError> {
        let endpoint = Url::parse(&config.base_url)?;
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config,
            endpoint,
            client,
            last_request: Mutex::new(None),
            request_count: AtomicU64::new(0),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn rate_limit(&self) {
        // Held across the sleep so concurrent callers queue up behind each other.
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let spacing = Duration::from_millis(self.config.rate_limit_ms);
            let elapsed = prev.elapsed();
            if elapsed < spacing {
                tokio::time::sleep(spacing - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn query<V: Serialize, T: DeserializeOwned>(
        &self,
        request: &GraphQlRequest<'_, V>,
    ) -> Result<T, IndexError> {
        self.rate_limit().await;

        let mut last_err = None;
        for attempt in 0..=self.config.max_retries {
            let res = self
                .client
                .post(self.endpoint.clone())
                .header(CACHE_CONTROL, "no-cache")
                .header(PRAGMA, "no-cache")
                .json(request)
                .send()
                .await;
            match res {
                Ok(r) => {
                    let status = r.status();
                    let body = r.text().await.unwrap_or_default();
                    if !status.is_success() {
                        last_err = Some(IndexError::Api(status.as_u16(), body));
                        if attempt < self.config.max_retries {
                            let ms = retry_delay_ms(self.config.retry_backoff_ms, attempt);
                            warn!(attempt, ms, status = status.as_u16(), "retry after status");
                            tokio::time::sleep(Duration::from_millis(ms)).await;
                        }
                        continue;
                    }
                    self.request_count.fetch_add(1, Ordering::Relaxed);
                    let parsed: GraphQlResponse<T> = serde_json::from_str(&body)?;
                    if let Some(errors) = parsed.errors.filter(|e| !e.is_empty()) {
                        let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
                        return Err(IndexError::GraphQl(messages.join("; ")));
                    }
                    return parsed
                        .data
                        .ok_or_else(|| IndexError::GraphQl("response has no data".to_string()));
                }
                Err(e) => {
                    last_err = Some(IndexError::Request(e));
                    if attempt < self.config.max_retries {
                        let ms = retry_delay_ms(self.config.retry_backoff_ms, attempt);
                        warn!(attempt, ms, "retry after error");
                        tokio::time::sleep(Duration::from_millis(ms)).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or(IndexError::Api(0, "unknown".to_string())))
    }

    /// Notices recorded for `keys`. Empty while the input has not been processed yet.
    pub async fn notices_for(&self, keys: &NoticeKeys) -> Result<Vec<Notice>, IndexError> {
        let request = GraphQlRequest {
            operation_name: "getNoticeByInputIndex",
            query: NOTICE_QUERY,
            variables: NoticeVariables {
                input_index: &keys.input_index,
                epoch_index: &keys.epoch_index,
            },
        };
        let data: NoticeData = self.query(&request).await?;
        let notices = data.get_notice.unwrap_or_default();
        debug!(
            epoch = %keys.epoch_index,
            input = %keys.input_index,
            count = notices.len(),
            "GetNotice"
        );
        Ok(notices)
    }

    /// Number of successful requests.
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }
}
