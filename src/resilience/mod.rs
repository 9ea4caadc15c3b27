//! 弹性模块：为单个批次的远程调用提供固定次数、固定间隔的重试。
//!
//! # Resilience Module
//!
//! Retry for per-batch remote calls.
//!
//! ## Overview
//!
//! Every per-attempt failure a worker reports (timeout, transport failure, any non-2xx
//! status, undecodable body) is retried with the same fixed delay until the attempt budget
//! is used up. The budget counts attempts, not retries: the default of 3 means at most two
//! retries. A batch that exhausts its budget yields [`crate::Error::RetryExhausted`], which the
//! dispatcher treats as fatal.
//!
//! ```rust
//! use sample_dispatch::resilience::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new(3, Duration::from_secs(1));
//! assert_eq!(policy.delay_after(1), Some(Duration::from_secs(1)));
//! assert_eq!(policy.delay_after(3), None);
//! ```

pub mod retry;

pub use retry::{RetryPolicy, RetryingWorker};
