//! Mock feature worker for integration tests

#![allow(dead_code)]

use mockito::{Matcher, Mock, Server, ServerGuard};
use sample_dispatch::config::{DispatchConfig, TimeoutConfig};
use sample_dispatch::features::{EmbeddingParams, ProcessParams, StoreParams};
use sample_dispatch::worker::PROCESS_FILES_PATH;
use std::time::Duration;

/// Test fixture that owns a mock worker server
pub struct MockWorkerFixture {
    pub server: ServerGuard,
    pub base_url: String,
}

impl MockWorkerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self { server, base_url }
    }

    /// Configuration pointed at the mock server, with a short retry delay
    pub fn config(&self) -> DispatchConfig {
        DispatchConfig::new()
            .with_service_url(self.base_url.clone())
            .with_retry_delay(Duration::from_millis(10))
            .with_timeouts(TimeoutConfig {
                total: Duration::from_secs(5),
                connect: Duration::from_secs(2),
                read: Duration::from_secs(5),
            })
    }

    /// Answer every batch call with `status` and `body`, `hits` times
    pub async fn mock_any_batch(&mut self, status: usize, body: &str, hits: usize) -> Mock {
        self.server
            .mock("POST", PROCESS_FILES_PATH)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .expect(hits)
            .create_async()
            .await
    }

    /// Answer calls for one batch index only
    pub async fn mock_batch(&mut self, index: usize, status: usize, body: &str) -> Mock {
        self.server
            .mock("POST", PROCESS_FILES_PATH)
            .match_header("x-batch-index", index.to_string().as_str())
            .match_header("x-request-id", Matcher::Any)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }
}

pub fn params() -> ProcessParams {
    ProcessParams::new(
        StoreParams {
            base_url: "http://minio:9000".into(),
            access_key: "minio".into(),
            secret_key: "minio123".into(),
            bucket_name: "samples".into(),
        },
        EmbeddingParams::new("umap").with_n_neighbors(15),
    )
}

pub fn keys(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("kit/{:03}.wav", i)).collect()
}

/// A JSON array of `n` one-element vectors counting up from `start`
pub fn vectors(start: usize, n: usize) -> String {
    let v: Vec<Vec<f64>> = (start..start + n).map(|i| vec![i as f64]).collect();
    serde_json::to_string(&v).unwrap_or_default()
}
