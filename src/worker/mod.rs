//! Batch worker clients.
//!
//! A worker performs exactly one remote call for one batch and classifies its failure. It does
//! not retry; see [`crate::resilience::RetryingWorker`] for that.

mod http;

pub use http::{HttpWorker, HttpWorkerBuilder, PROCESS_FILES_PATH};

use crate::batch::Batch;
use crate::Result;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// One remote "process batch" call.
///
/// Implementations must be safe to call concurrently from many batches at once and must return
/// exactly one result per key, in key order.
#[async_trait]
pub trait BatchWorker<P>: Send + Sync
where
    P: Send + Sync + 'static,
{
    type Output: Send + 'static;

    async fn submit(&self, batch: &Batch<P>) -> Result<Vec<Self::Output>>;
}

#[async_trait]
impl<P, W> BatchWorker<P> for Arc<W>
where
    P: Send + Sync + 'static,
    W: BatchWorker<P> + ?Sized,
{
    type Output = W::Output;

    async fn submit(&self, batch: &Batch<P>) -> Result<Vec<W::Output>> {
        (**self).submit(batch).await
    }
}

/// Adapts an async closure into a [`BatchWorker`].
///
/// The closure receives its own clone of the batch on every call.
pub struct FnWorker<F> {
    f: F,
}

pub fn worker_fn<P, R, F, Fut>(f: F) -> FnWorker<F>
where
    F: Fn(Batch<P>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<R>>> + Send + 'static,
{
    FnWorker { f }
}

#[async_trait]
impl<P, R, F, Fut> BatchWorker<P> for FnWorker<F>
where
    P: Send + Sync + 'static,
    R: Send + 'static,
    F: Fn(Batch<P>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<R>>> + Send + 'static,
{
    type Output = R;

    async fn submit(&self, batch: &Batch<P>) -> Result<Vec<R>> {
        (self.f)(batch.clone()).await
    }
}
