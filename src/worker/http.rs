use super::BatchWorker;
use crate::batch::Batch;
use crate::config::{DispatchConfig, TimeoutConfig};
use crate::error::TimeoutPhase;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use futures::Stream;
use reqwest::header::CONTENT_TYPE;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

/// Path of the feature worker's batch endpoint.
pub const PROCESS_FILES_PATH: &str = "/process_files";

/// Request body: the shared parameters with the batch's keys spliced in.
#[derive(Serialize)]
struct ProcessFilesBody<'a, P> {
    #[serde(flatten)]
    params: &'a P,
    object_keys: &'a [String],
}

/// Single-chunk request body that reports when the connection has taken all of it.
struct WriteSignal {
    payload: Option<Vec<u8>>,
    written: Option<oneshot::Sender<()>>,
}

impl WriteSignal {
    fn new(payload: Vec<u8>, written: oneshot::Sender<()>) -> Self {
        Self {
            payload: Some(payload),
            written: Some(written),
        }
    }
}

impl Stream for WriteSignal {
    type Item = std::io::Result<Vec<u8>>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(payload) = self.payload.take() {
            return Poll::Ready(Some(Ok(payload)));
        }
        // Polled past the only chunk: the body has been written out.
        if let Some(written) = self.written.take() {
            let _ = written.send(());
        }
        Poll::Ready(None)
    }
}

/// Worker that posts one batch to a remote HTTP service.
///
/// `P` must serialize as a JSON object; the body sent is that object with an `object_keys`
/// field holding the batch's keys. The response must be a JSON array with one `R` per key.
///
/// Built with [`HttpWorkerBuilder`], which is also where `R` is chosen.
///
/// Timeouts per call: `connect` bounds connection setup, `total` bounds everything up to the
/// request body being written, and `read` bounds the wait for the response head and, afresh,
/// the read of the response body.
pub struct HttpWorker<R> {
    client: reqwest::Client,
    endpoint: String,
    timeouts: TimeoutConfig,
    _output: PhantomData<fn() -> R>,
}

impl<R> HttpWorker<R> {
    /// Build a worker for the service configured in `config`.
    pub fn from_config(config: &DispatchConfig) -> Result<Self> {
        HttpWorkerBuilder::new()
            .service_url(config.service_url.clone())
            .timeouts(config.timeouts)
            .build()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn classify(e: reqwest::Error, index: usize) -> Error {
    if e.is_timeout() {
        let phase = if e.is_connect() {
            TimeoutPhase::Connect
        } else {
            TimeoutPhase::Request
        };
        return Error::Timeout { phase, after: None };
    }
    Error::transport_with_context(
        e.to_string(),
        ErrorContext::new()
            .with_batch_index(index)
            .with_source("http_worker"),
    )
}

#[async_trait]
impl<P, R> BatchWorker<P> for HttpWorker<R>
where
    P: Serialize + Send + Sync + 'static,
    R: DeserializeOwned + Send + 'static,
{
    type Output = R;

    async fn submit(&self, batch: &Batch<P>) -> Result<Vec<R>> {
        let request_id = Uuid::new_v4().to_string();
        let payload = serde_json::to_vec(&ProcessFilesBody {
            params: batch.params.as_ref(),
            object_keys: &batch.keys,
        })
        .map_err(|e| {
            Error::validation_with_context(
                format!("batch parameters do not serialize: {}", e),
                ErrorContext::new()
                    .with_batch_index(batch.index)
                    .with_source("http_worker"),
            )
        })?;
        let start = Instant::now();

        let (written_tx, mut written_rx) = oneshot::channel();
        let send = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header("x-request-id", &request_id)
            .header("x-batch-index", batch.index.to_string())
            .body(reqwest::Body::wrap_stream(WriteSignal::new(payload, written_tx)))
            .send();
        tokio::pin!(send);

        // `total` runs until the request body is handed to the connection, `read` from
        // then until the response head arrives.
        let deadline = tokio::time::sleep(self.timeouts.total);
        tokio::pin!(deadline);
        let mut phase = TimeoutPhase::Request;
        let resp = loop {
            tokio::select! {
                res = &mut send => break res.map_err(|e| classify(e, batch.index))?,
                _ = &mut written_rx, if phase == TimeoutPhase::Request => {
                    phase = TimeoutPhase::Read;
                    deadline
                        .as_mut()
                        .reset(tokio::time::Instant::now() + self.timeouts.read);
                }
                () = &mut deadline => {
                    let after = match phase {
                        TimeoutPhase::Request => self.timeouts.total,
                        _ => self.timeouts.read,
                    };
                    return Err(Error::Timeout {
                        phase,
                        after: Some(after),
                    });
                }
            }
        };

        let status = resp.status();
        let bytes = tokio::time::timeout(self.timeouts.read, resp.bytes())
            .await
            .map_err(|_| Error::Timeout {
                phase: TimeoutPhase::Read,
                after: Some(self.timeouts.read),
            })?
            .map_err(|e| classify(e, batch.index))?;

        debug!(
            batch_index = batch.index,
            keys = batch.len(),
            http_status = status.as_u16(),
            request_id = request_id.as_str(),
            duration_ms = start.elapsed().as_millis() as u64,
            "batch call returned"
        );

        if !status.is_success() {
            return Err(Error::RemoteStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        let results: Vec<R> = serde_json::from_slice(&bytes).map_err(|e| {
            Error::decode_with_context(
                format!("invalid batch response: {}", e),
                ErrorContext::new()
                    .with_batch_index(batch.index)
                    .with_source("http_worker"),
            )
        })?;
        if results.len() != batch.len() {
            return Err(Error::decode_with_context(
                format!(
                    "expected {} results, worker returned {}",
                    batch.len(),
                    results.len()
                ),
                ErrorContext::new()
                    .with_batch_index(batch.index)
                    .with_source("http_worker"),
            ));
        }
        Ok(results)
    }
}

/// Entry point for configuring an [`HttpWorker`].
pub struct HttpWorkerBuilder {
    service_url: String,
    path: String,
    timeouts: TimeoutConfig,
    pool_max_idle_per_host: usize,
}

impl HttpWorkerBuilder {
    pub fn new() -> Self {
        Self {
            service_url: crate::config::DEFAULT_SERVICE_URL.to_string(),
            path: PROCESS_FILES_PATH.to_string(),
            timeouts: TimeoutConfig::default(),
            pool_max_idle_per_host: 32,
        }
    }

    pub fn service_url(mut self, url: impl Into<String>) -> Self {
        self.service_url = url.into();
        self
    }

    /// Override the endpoint path (default `/process_files`).
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn pool_max_idle_per_host(mut self, n: usize) -> Self {
        self.pool_max_idle_per_host = n;
        self
    }

    pub fn build<R>(self) -> Result<HttpWorker<R>> {
        let path = if self.path.starts_with('/') {
            self.path
        } else {
            format!("/{}", self.path)
        };
        let endpoint = format!("{}{}", self.service_url.trim_end_matches('/'), path);
        url::Url::parse(&endpoint).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid worker endpoint: {}", e),
                ErrorContext::new()
                    .with_field_path("config.service_url")
                    .with_details(endpoint.clone())
                    .with_source("http_worker"),
            )
        })?;

        let client = reqwest::Client::builder()
            .connect_timeout(self.timeouts.connect)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .build()
            .map_err(|e| {
                Error::configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(HttpWorker {
            client,
            endpoint,
            timeouts: self.timeouts,
            _output: PhantomData,
        })
    }
}

impl Default for HttpWorkerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
