use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use opwatch_logging::{op_debug, op_trace, op_warn};
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{ApiError, EngineSettings, ErrorBody};

/// Decoded success body. `None` when the response carried no JSON.
pub type ApiBody = Option<Value>;

type SharedCall = Shared<BoxFuture<'static, Result<ApiBody, ApiError>>>;

/// Identity of a read request for coalescing: method plus normalized URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    method: Method,
    url: String,
}

impl RequestKey {
    fn new(method: &Method, url: &Url) -> Self {
        Self {
            method: method.clone(),
            url: url.as_str().to_string(),
        }
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    /// JSON body, sent for mutating calls only.
    pub body: Option<Value>,
    pub cancel: Option<CancellationToken>,
    /// Overrides the read deadline; for mutating calls there is none unless set here.
    pub deadline: Option<Duration>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self {
            method: Method::GET,
            body: None,
            cancel: None,
            deadline: None,
        }
    }

    pub fn post(body: Option<Value>) -> Self {
        Self {
            method: Method::POST,
            body,
            ..Self::get()
        }
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Reads are idempotent and eligible for coalescing and the default deadline.
fn is_read(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

/// Issues backend calls with deadlines and cancellation, coalescing identical reads.
#[derive(Clone)]
pub struct RequestExecutor {
    inner: Arc<ExecutorInner>,
}

struct ExecutorInner {
    client: reqwest::Client,
    base_url: Url,
    read_deadline: Duration,
    in_flight: Mutex<HashMap<RequestKey, SharedCall>>,
    issued: AtomicU64,
}

impl fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("base_url", &self.inner.base_url.as_str())
            .field("read_deadline", &self.inner.read_deadline)
            .field("in_flight", &self.in_flight_count())
            .finish()
    }
}

impl RequestExecutor {
    pub fn new(settings: &EngineSettings) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| ApiError::Network {
                endpoint: settings.base_url.to_string(),
                message: err.to_string(),
            })?;

        Ok(Self {
            inner: Arc::new(ExecutorInner {
                client,
                base_url: settings.base_url.clone(),
                read_deadline: settings.read_deadline,
                in_flight: Mutex::new(HashMap::new()),
                issued: AtomicU64::new(0),
            }),
        })
    }

    /// Number of network calls actually issued since construction.
    pub fn issued_count(&self) -> u64 {
        self.inner.issued.load(Ordering::Relaxed)
    }

    /// Number of distinct read requests currently awaiting a response.
    pub fn in_flight_count(&self) -> usize {
        self.inner.lock_in_flight().len()
    }

    pub async fn execute(&self, endpoint: &str, options: RequestOptions) -> Result<ApiBody, ApiError> {
        let url = self.resolve(endpoint)?;
        let RequestOptions {
            method,
            body,
            cancel,
            deadline,
        } = options;
        if cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(ApiError::Cancelled {
                endpoint: endpoint.to_string(),
            });
        }

        let call: BoxFuture<'static, Result<ApiBody, ApiError>> = if is_read(&method) {
            let deadline = deadline.unwrap_or(self.inner.read_deadline);
            self.coalesced(endpoint, method, url, deadline).boxed()
        } else {
            let inner = Arc::clone(&self.inner);
            let owned_endpoint = endpoint.to_string();
            async move {
                inner
                    .perform(&owned_endpoint, method, url, body, deadline)
                    .await
            }
            .boxed()
        };

        match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        op_debug!("caller detached from {}", endpoint);
                        Err(ApiError::Cancelled { endpoint: endpoint.to_string() })
                    }
                    result = call => result,
                }
            }
            None => call.await,
        }
    }

    pub async fn get(&self, endpoint: &str) -> Result<ApiBody, ApiError> {
        self.execute(endpoint, RequestOptions::get()).await
    }

    /// Reads and decodes a JSON document. A success without a JSON body is a decode failure.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<T, ApiError> {
        let mut options = RequestOptions::get();
        options.cancel = cancel;
        let body = self
            .execute(endpoint, options)
            .await?
            .ok_or_else(|| ApiError::DecodeFailure {
                endpoint: endpoint.to_string(),
                message: "expected a JSON body".to_string(),
            })?;
        serde_json::from_value(body).map_err(|err| ApiError::DecodeFailure {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        })
    }

    pub async fn post(&self, endpoint: &str, body: Option<Value>) -> Result<ApiBody, ApiError> {
        self.execute(endpoint, RequestOptions::post(body)).await
    }

    fn resolve(&self, endpoint: &str) -> Result<Url, ApiError> {
        let mut url = self
            .inner
            .base_url
            .join(endpoint)
            .map_err(|err| ApiError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            })?;
        normalize(&mut url);
        Ok(url)
    }

    /// Returns the shared call for this read, issuing it only if none is pending.
    ///
    /// The call runs on its own task so detaching callers never stop it; that task
    /// removes the map entry the moment the call settles.
    fn coalesced(&self, endpoint: &str, method: Method, url: Url, deadline: Duration) -> SharedCall {
        let key = RequestKey::new(&method, &url);
        let mut in_flight = self.inner.lock_in_flight();
        if let Some(existing) = in_flight.get(&key) {
            op_debug!("joining in-flight {}", key);
            return existing.clone();
        }

        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let task_endpoint = endpoint.to_string();
        let handle = tokio::spawn(async move {
            let result = inner
                .perform(&task_endpoint, method, url, None, Some(deadline))
                .await;
            inner.lock_in_flight().remove(&task_key);
            op_trace!("settled {}", task_key);
            result
        });

        let endpoint = endpoint.to_string();
        let shared = handle
            .map(move |joined| {
                joined.unwrap_or_else(|err| {
                    Err(ApiError::Network {
                        endpoint,
                        message: format!("request task failed: {err}"),
                    })
                })
            })
            .boxed()
            .shared();
        in_flight.insert(key, shared.clone());
        shared
    }
}

impl ExecutorInner {
    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, HashMap<RequestKey, SharedCall>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn perform(
        &self,
        endpoint: &str,
        method: Method,
        url: Url,
        body: Option<Value>,
        deadline: Option<Duration>,
    ) -> Result<ApiBody, ApiError> {
        let started = Instant::now();
        self.issued.fetch_add(1, Ordering::Relaxed);
        op_debug!("issuing {} {}", method, url);

        let request = async {
            let mut builder = self.client.request(method, url);
            if let Some(body) = body.as_ref() {
                builder = builder.json(body);
            }
            let response = builder
                .send()
                .await
                .map_err(|err| ApiError::from_reqwest(endpoint, err, elapsed_ms(started)))?;
            read_response(endpoint, response, started).await
        };

        match deadline {
            Some(limit) => match tokio::time::timeout(limit, request).await {
                Ok(result) => result,
                Err(_) => {
                    let elapsed_ms = elapsed_ms(started);
                    op_warn!("{} exceeded its deadline after {} ms", endpoint, elapsed_ms);
                    Err(ApiError::Timeout {
                        endpoint: endpoint.to_string(),
                        elapsed_ms,
                    })
                }
            },
            None => request.await,
        }
    }
}

async fn read_response(
    endpoint: &str,
    response: reqwest::Response,
    started: Instant,
) -> Result<ApiBody, ApiError> {
    let status = response.status();
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(is_json_content_type);
    let bytes = response
        .bytes()
        .await
        .map_err(|err| ApiError::from_reqwest(endpoint, err, elapsed_ms(started)))?;

    if !status.is_success() {
        return Err(ApiError::HttpStatus {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body: ErrorBody::decode(&bytes),
        });
    }

    if !is_json || bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|err| ApiError::DecodeFailure {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        })
}

fn is_json_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || mime.ends_with("+json")
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Drops the fragment and sorts query pairs so equivalent reads share a key.
fn normalize(url: &mut Url) {
    url.set_fragment(None);
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    if pairs.is_empty() {
        url.set_query(None);
        return;
    }
    pairs.sort();
    url.query_pairs_mut().clear().extend_pairs(pairs);
}
