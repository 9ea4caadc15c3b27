//! Result aggregation.

use crate::{Error, ErrorContext, Result};
use std::collections::BTreeMap;

/// Flatten per-batch results into one list ordered by batch index.
///
/// `completed` must hold exactly the indices `0..batch_count`; a missing index is reported
/// rather than producing a short result.
pub fn aggregate<R>(completed: BTreeMap<usize, Vec<R>>, batch_count: usize) -> Result<Vec<R>> {
    if completed.len() != batch_count {
        let missing = (0..batch_count).find(|i| !completed.contains_key(i));
        let mut context = ErrorContext::new()
            .with_details(format!(
                "{} of {} batches completed",
                completed.len(),
                batch_count
            ))
            .with_source("aggregator");
        if let Some(i) = missing {
            context = context.with_batch_index(i);
        }
        return Err(Error::runtime_with_context("incomplete batch results", context));
    }
    if let Some((&last, _)) = completed.last_key_value() {
        if last >= batch_count {
            return Err(Error::runtime_with_context(
                "unexpected batch index",
                ErrorContext::new()
                    .with_batch_index(last)
                    .with_source("aggregator"),
            ));
        }
    }

    let total = completed.values().map(Vec::len).sum();
    let mut out = Vec::with_capacity(total);
    // BTreeMap iterates in ascending key order.
    for (_, results) in completed {
        out.extend(results);
    }
    Ok(out)
}
