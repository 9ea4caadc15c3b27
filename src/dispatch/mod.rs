//! 调度模块：在有限并发窗口内执行批次，任一批次完成即补位。
//!
//! # Dispatch Module
//!
//! Saturating, bounded-concurrency dispatch of batches to a [`crate::worker::BatchWorker`].
//!
//! ## Overview
//!
//! ```text
//!   keys ──► chunk ──► pending (FIFO) ──► active (≤ max_concurrency) ──► completed
//!                                            │  first completion frees a slot
//!                                            └──────── refill ◄─────────┘
//! ```
//!
//! - Admission is eager: whenever a slot frees, the next queued batch starts immediately.
//! - Each batch runs in its own task and goes through the retry wrapper.
//! - Completion order is arbitrary; the returned list is always in input order.
//! - The first batch to exhaust its retries fails the dispatch. In-flight siblings are
//!   aborted and nothing queued is started; no partial result is returned.
//!
//! ## Example
//!
//! ```rust
//! use sample_dispatch::batch::Batch;
//! use sample_dispatch::config::DispatchConfig;
//! use sample_dispatch::dispatch::Dispatcher;
//! use sample_dispatch::worker::worker_fn;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> sample_dispatch::Result<()> {
//! let worker = worker_fn(|batch: Batch<()>| async move {
//!     Ok(batch.keys.iter().map(|k| k.len()).collect::<Vec<usize>>())
//! });
//! let config = DispatchConfig::new().with_chunk_size(2).with_max_concurrency(2);
//! let dispatcher = Dispatcher::new(worker, config)?;
//!
//! let keys = vec!["a.wav".to_string(), "bb.wav".into(), "ccc.wav".into()];
//! let lengths = dispatcher.dispatch(keys, ()).await?;
//! assert_eq!(lengths, vec![5, 6, 7]);
//! # Ok(())
//! # }
//! ```

mod dispatcher;
mod state;

pub use dispatcher::Dispatcher;
pub use state::DispatchStats;
