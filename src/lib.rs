//! # sample-dispatch
//!
//! 将大量有序的音频对象键分批发送给远程特征服务，限制并发、逐批重试，并按原始顺序汇总结果。
//!
//! Bounded-concurrency batch dispatch for remote audio feature extraction.
//!
//! ## Overview
//!
//! A sample library can hold hundreds of thousands of audio files, while the feature worker
//! only accepts a bounded number of keys per call. This crate splits the ordered key list into
//! index-tagged batches, keeps a fixed number of batch calls in flight, retries each failed
//! call a fixed number of times, and reassembles the per-batch results into one list in the
//! original key order.
//!
//! ## Core Guarantees
//!
//! - **Ordered**: the output lines up with the input keys, whatever order batches finish in
//! - **Bounded**: never more than `max_concurrency` batch calls in flight
//! - **Saturating**: a freed slot is refilled immediately, not at the end of a round
//! - **All or nothing**: either every batch succeeds or the caller gets exactly one error
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sample_dispatch::config::DispatchConfig;
//! use sample_dispatch::features::{EmbeddingParams, FeatureDispatch, ProcessParams, StoreParams};
//!
//! #[tokio::main]
//! async fn main() -> sample_dispatch::Result<()> {
//!     let config = DispatchConfig::new().with_service_url("http://feature-worker:8080");
//!     let client = FeatureDispatch::new(config)?;
//!
//!     let params = ProcessParams::new(
//!         StoreParams {
//!             base_url: "https://s3.example.com".into(),
//!             access_key: "...".into(),
//!             secret_key: "...".into(),
//!             bucket_name: "samples".into(),
//!         },
//!         EmbeddingParams::new("umap"),
//!     );
//!     let keys = vec!["drums/kick_01.wav".to_string(), "fx/riser.flac".to_string()];
//!     let vectors = client.extract(keys, params).await?;
//!     assert_eq!(vectors.len(), 2);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Explicit dispatch configuration and env loading |
//! | [`batch`] | Chunking and ordered aggregation |
//! | [`worker`] | The batch worker trait and the HTTP worker |
//! | [`resilience`] | Fixed-budget retry wrapper |
//! | [`dispatch`] | The bounded-concurrency dispatcher |
//! | [`features`] | Audio feature request model and extraction facade |

pub mod batch;
pub mod config;
pub mod dispatch;
pub mod features;
pub mod resilience;
pub mod worker;

// Re-export main types for convenience
pub use batch::Batch;
pub use config::{DispatchConfig, TimeoutConfig};
pub use dispatch::{DispatchStats, Dispatcher};
pub use features::{FeatureDispatch, FeatureSet, ProcessParams};
pub use resilience::{RetryPolicy, RetryingWorker};
pub use worker::{BatchWorker, HttpWorker};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext, TimeoutPhase};
