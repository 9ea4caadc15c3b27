//! Batch chunker.

use crate::{Error, ErrorContext, Result};
use std::sync::Arc;

/// One unit of remote work: a contiguous slice of the input keys.
///
/// Batches are immutable once built; the parameters are shared between all batches of one
/// dispatch.
#[derive(Debug)]
pub struct Batch<P> {
    pub index: usize,
    pub keys: Vec<String>,
    pub params: Arc<P>,
}

// Manual impl: cloning a batch must not require `P: Clone`.
impl<P> Clone for Batch<P> {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            keys: self.keys.clone(),
            params: Arc::clone(&self.params),
        }
    }
}

impl<P> Batch<P> {
    pub fn len(&self) -> usize {
        self.keys.len()
    }
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Split `keys` into batches of at most `chunk_size` keys.
///
/// Produces `ceil(N / chunk_size)` batches with indices `0..K` in input order. Nothing is
/// reordered, deduplicated or dropped; an empty input yields no batches.
pub fn chunk<P>(keys: Vec<String>, chunk_size: usize, params: Arc<P>) -> Result<Vec<Batch<P>>> {
    if chunk_size == 0 {
        return Err(Error::configuration_with_context(
            "chunk size must be at least 1",
            ErrorContext::new()
                .with_field_path("config.chunk_size")
                .with_source("chunker"),
        ));
    }

    let mut batches = Vec::with_capacity(keys.len().div_ceil(chunk_size));
    let mut rest = keys.into_iter().peekable();
    while rest.peek().is_some() {
        let keys: Vec<String> = rest.by_ref().take(chunk_size).collect();
        batches.push(Batch {
            index: batches.len(),
            keys,
            params: Arc::clone(&params),
        });
    }
    Ok(batches)
}
