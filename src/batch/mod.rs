//! 批次模块：把有序的对象键切分为带序号的批次，并按序号重新拼接结果。
//!
//! # Batch Module
//!
//! Splits an ordered list of object keys into index-tagged batches and reassembles
//! per-batch results into one ordered list.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Batch`] | One contiguous slice of the input plus the shared parameters |
//! | [`chunk`] | Splits keys into `ceil(N / C)` batches, indices in input order |
//! | [`aggregate`] | Concatenates completed results by ascending batch index |
//!
//! ## Example
//!
//! ```rust
//! use sample_dispatch::batch::{aggregate, chunk};
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! let keys: Vec<String> = (0..5).map(|i| format!("kick_{i}.wav")).collect();
//! let batches = chunk(keys, 2, Arc::new(())).unwrap();
//! assert_eq!(batches.len(), 3);
//!
//! let completed: BTreeMap<usize, Vec<usize>> =
//!     batches.iter().map(|b| (b.index, vec![b.index; b.len()])).collect();
//! assert_eq!(aggregate(completed, batches.len()).unwrap(), vec![0, 0, 1, 1, 2]);
//! ```

mod aggregator;
mod chunker;

pub use aggregator::aggregate;
pub use chunker::{chunk, Batch};
