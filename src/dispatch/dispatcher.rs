use super::state::{DispatchState, DispatchStats};
use crate::batch::{chunk, Batch};
use crate::config::DispatchConfig;
use crate::resilience::{RetryPolicy, RetryingWorker};
use crate::worker::BatchWorker;
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// Bounded-concurrency batch scheduler.
///
/// Keeps up to `max_concurrency` batches in flight and refills the window as soon as any one
/// of them finishes. The first batch that exhausts its retry budget fails the whole dispatch;
/// batches still in flight at that moment are aborted and queued ones never start.
pub struct Dispatcher<W> {
    worker: Arc<W>,
    config: DispatchConfig,
}

impl<W> Dispatcher<W> {
    pub fn new(worker: W, config: DispatchConfig) -> Result<Self> {
        Self::from_shared(Arc::new(worker), config)
    }

    pub fn from_shared(worker: Arc<W>, config: DispatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { worker, config })
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// A dispatcher sharing this one's worker under a different configuration.
    pub fn with_config(&self, config: DispatchConfig) -> Result<Self> {
        Self::from_shared(Arc::clone(&self.worker), config)
    }

    /// Process `keys` with shared `params` and return one result per key, in key order.
    pub async fn dispatch<P>(&self, keys: Vec<String>, params: P) -> Result<Vec<W::Output>>
    where
        P: Send + Sync + 'static,
        W: BatchWorker<P> + 'static,
    {
        self.dispatch_with_stats(keys, params)
            .await
            .map(|(results, _)| results)
    }

    pub async fn dispatch_with_stats<P>(
        &self,
        keys: Vec<String>,
        params: P,
    ) -> Result<(Vec<W::Output>, DispatchStats)>
    where
        P: Send + Sync + 'static,
        W: BatchWorker<P> + 'static,
    {
        let item_count = keys.len();
        let batches = chunk(keys, self.config.chunk_size, Arc::new(params))?;
        info!(
            items = item_count,
            batches = batches.len(),
            chunk_size = self.config.chunk_size,
            "dispatching batches"
        );
        self.run(batches).await
    }

    /// Drive already-built batches to completion.
    ///
    /// Batch indices must be `0..batches.len()`, each used once, as produced by
    /// [`crate::batch::chunk`].
    pub async fn run<P>(&self, batches: Vec<Batch<P>>) -> Result<(Vec<W::Output>, DispatchStats)>
    where
        P: Send + Sync + 'static,
        W: BatchWorker<P> + 'static,
    {
        let item_count = batches.iter().map(Batch::len).sum();
        let start = Instant::now();
        let policy = RetryPolicy::from_config(&self.config);
        let limit = self.config.max_concurrency;

        let mut state: DispatchState<P, W::Output> = DispatchState::new(batches);
        let mut active: JoinSet<(usize, Result<Vec<W::Output>>)> = JoinSet::new();

        while !state.is_done() {
            while let Some(batch) = state.admit(limit) {
                debug!(
                    batch_index = batch.index,
                    keys = batch.len(),
                    "admitting batch"
                );
                let worker = RetryingWorker::new(Arc::clone(&self.worker), policy);
                active.spawn(async move {
                    let index = batch.index;
                    (index, worker.attempt(&batch).await)
                });
            }

            // Wait for whichever batch finishes first.
            let joined = match active.join_next().await {
                Some(joined) => joined,
                None => {
                    return Err(Error::runtime_with_context(
                        "dispatch stalled with batches outstanding",
                        ErrorContext::new()
                            .with_details(format!(
                                "{} pending, {} in flight",
                                state.pending(),
                                state.in_flight()
                            ))
                            .with_source("dispatcher"),
                    ))
                }
            };

            match joined {
                Ok((index, Ok(results))) => {
                    state.complete(index, results);
                    info!(
                        batch_index = index,
                        completed = state.completed(),
                        active = state.in_flight(),
                        pending = state.pending(),
                        total = state.batch_count(),
                        "batch completed"
                    );
                }
                Ok((index, Err(e))) => {
                    error!(
                        batch_index = index,
                        error = %e,
                        aborted = active.len(),
                        never_started = state.pending(),
                        "batch failed, abandoning dispatch"
                    );
                    active.abort_all();
                    return Err(e);
                }
                Err(join_err) => {
                    error!(error = %join_err, "batch task did not finish");
                    active.abort_all();
                    return Err(Error::runtime_with_context(
                        format!("batch task failed: {}", join_err),
                        ErrorContext::new().with_source("dispatcher"),
                    ));
                }
            }
        }

        let stats = DispatchStats {
            batch_count: state.batch_count(),
            item_count,
            max_active: state.max_active(),
            elapsed: start.elapsed(),
        };
        let results = state.into_results()?;
        Ok((results, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::worker_fn;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{}", i)).collect()
    }

    fn config(limit: usize, chunk: usize) -> DispatchConfig {
        DispatchConfig::new()
            .with_max_concurrency(limit)
            .with_chunk_size(chunk)
            .with_retry_delay(Duration::from_millis(10))
    }

    /// Echoes keys back as numbers after a per-batch delay.
    fn echo_with_delay(delays: Vec<u64>) -> impl BatchWorker<(), Output = usize> {
        let delays = Arc::new(delays);
        worker_fn(move |batch: Batch<()>| {
            let delay = delays.get(batch.index).copied().unwrap_or(0);
            async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(batch
                    .keys
                    .iter()
                    .map(|k| k.parse::<usize>().unwrap())
                    .collect::<Vec<usize>>())
            }
        })
    }

    #[tokio::test]
    async fn test_empty_input() {
        let dispatcher = Dispatcher::new(echo_with_delay(vec![]), config(5, 100)).unwrap();
        let (out, stats) = dispatcher.dispatch_with_stats(vec![], ()).await.unwrap();
        assert!(out.is_empty());
        assert_eq!(stats.batch_count, 0);
        assert_eq!(stats.max_active, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_250_items_all_admitted_at_once() {
        let dispatcher =
            Dispatcher::new(echo_with_delay(vec![30, 20, 10]), config(5, 100)).unwrap();
        let (out, stats) = dispatcher.dispatch_with_stats(keys(250), ()).await.unwrap();
        assert_eq!(out, (0..250).collect::<Vec<_>>());
        assert_eq!(stats.batch_count, 3);
        assert_eq!(stats.item_count, 250);
        assert_eq!(stats.max_active, 3);
        // All three ran side by side: the slowest batch bounds the wall time.
        assert!(stats.elapsed < Duration::from_millis(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refills_on_first_completion() {
        #[derive(Debug, PartialEq)]
        enum Event {
            Start(usize),
            Finish(usize),
        }
        let log = Arc::new(Mutex::new(Vec::new()));
        let delays = Arc::new(vec![50u64, 10, 10]);
        let events = log.clone();
        let worker = worker_fn(move |batch: Batch<()>| {
            let events = events.clone();
            let delay = delays[batch.index];
            async move {
                events.lock().unwrap().push(Event::Start(batch.index));
                tokio::time::sleep(Duration::from_millis(delay)).await;
                events.lock().unwrap().push(Event::Finish(batch.index));
                Ok(batch.keys.clone())
            }
        });

        let dispatcher = Dispatcher::new(worker, config(2, 5)).unwrap();
        let (out, stats) = dispatcher.dispatch_with_stats(keys(12), ()).await.unwrap();
        assert_eq!(out, keys(12));
        assert_eq!(stats.max_active, 2);

        let log = log.lock().unwrap();
        let pos = |e: Event| log.iter().position(|x| *x == e).unwrap();
        assert!(pos(Event::Start(0)) < pos(Event::Finish(1)));
        assert!(pos(Event::Start(1)) < pos(Event::Finish(1)));
        // Batch 2 waits for a free slot, then takes it before batch 0 is done.
        assert!(pos(Event::Start(2)) > pos(Event::Finish(1)));
        assert!(pos(Event::Start(2)) < pos(Event::Finish(0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_never_exceeds_limit() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (c, p) = (current.clone(), peak.clone());
        let worker = worker_fn(move |batch: Batch<()>| {
            let (c, p) = (c.clone(), p.clone());
            async move {
                let now = c.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                // Uneven latencies so completions interleave.
                tokio::time::sleep(Duration::from_millis(5 + (batch.index as u64 * 7) % 23)).await;
                c.fetch_sub(1, Ordering::SeqCst);
                Ok(batch.keys.clone())
            }
        });
        let dispatcher = Dispatcher::new(worker, config(3, 4)).unwrap();
        let (out, stats) = dispatcher.dispatch_with_stats(keys(97), ()).await.unwrap();
        assert_eq!(out, keys(97));
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(stats.max_active, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_independent_of_completion_order() {
        let n = 40;
        let in_order = Dispatcher::new(echo_with_delay(vec![1; 8]), config(8, 5))
            .unwrap()
            .dispatch(keys(n), ())
            .await
            .unwrap();
        for delays in [
            vec![80, 70, 60, 50, 40, 30, 20, 10],
            vec![10, 80, 20, 70, 30, 60, 40, 50],
            vec![5, 5, 90, 5, 5, 5, 1, 45],
        ] {
            let out = Dispatcher::new(echo_with_delay(delays), config(8, 5))
                .unwrap()
                .dispatch(keys(n), ())
                .await
                .unwrap();
            assert_eq!(out, in_order);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_absorbed() {
        let attempts = Arc::new(Mutex::new(vec![0u32; 3]));
        let seen = attempts.clone();
        let worker = worker_fn(move |batch: Batch<()>| {
            let attempt = {
                let mut seen = seen.lock().unwrap();
                seen[batch.index] += 1;
                seen[batch.index]
            };
            async move {
                if batch.index == 1 && attempt < 3 {
                    return Err(Error::Timeout {
                        phase: crate::error::TimeoutPhase::Read,
                        after: None,
                    });
                }
                Ok(batch.keys.clone())
            }
        });
        let dispatcher = Dispatcher::new(worker, config(5, 4)).unwrap();
        let out = dispatcher.dispatch(keys(12), ()).await.unwrap();
        assert_eq!(out, keys(12));
        assert_eq!(*attempts.lock().unwrap(), vec![1, 3, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_batch_fails_dispatch() {
        let worker = worker_fn(move |batch: Batch<()>| async move {
            if batch.index == 2 {
                Err(Error::RemoteStatus {
                    status: 500,
                    body: "feature extraction failed".into(),
                })
            } else {
                Ok(batch.keys.clone())
            }
        });
        let dispatcher = Dispatcher::new(worker, config(5, 3)).unwrap();
        let err = dispatcher.dispatch(keys(12), ()).await.unwrap_err();
        match err {
            Error::RetryExhausted {
                index, attempts, ..
            } => {
                assert_eq!(index, 2);
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_aborts_siblings_and_skips_queue() {
        let finished = Arc::new(Mutex::new(Vec::new()));
        let started = Arc::new(Mutex::new(Vec::new()));
        let (f, s) = (finished.clone(), started.clone());
        let worker = worker_fn(move |batch: Batch<()>| {
            let (f, s) = (f.clone(), s.clone());
            async move {
                s.lock().unwrap().push(batch.index);
                if batch.index == 0 {
                    return Err(Error::RemoteStatus {
                        status: 502,
                        body: String::new(),
                    });
                }
                tokio::time::sleep(Duration::from_secs(30)).await;
                f.lock().unwrap().push(batch.index);
                Ok(batch.keys.clone())
            }
        });
        let dispatcher = Dispatcher::new(worker, config(2, 1)).unwrap();
        let err = dispatcher.dispatch(keys(5), ()).await.unwrap_err();
        assert_eq!(err.batch_index(), Some(0));

        // Give an aborted sibling every chance to finish if it had not been cancelled.
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(finished.lock().unwrap().is_empty());
        // Batch 0 was retried; only the first window was ever started.
        let started = started.lock().unwrap();
        assert!(started.contains(&1));
        assert!(started.iter().all(|&i| i < 2));
    }

    #[tokio::test]
    async fn test_panicking_batch_is_fatal() {
        let worker = worker_fn(move |batch: Batch<()>| async move {
            if batch.index == 1 {
                panic!("worker bug");
            }
            Ok(batch.keys.clone())
        });
        let dispatcher = Dispatcher::new(worker, config(2, 2)).unwrap();
        let err = dispatcher.dispatch(keys(6), ()).await.unwrap_err();
        assert!(matches!(err, Error::Runtime { .. }));
    }

    #[tokio::test]
    async fn test_with_config_overrides_per_call() {
        let dispatcher = Dispatcher::new(echo_with_delay(vec![]), config(5, 100)).unwrap();
        let narrow = dispatcher.with_config(config(1, 2)).unwrap();
        let (out, stats) = narrow.dispatch_with_stats(keys(7), ()).await.unwrap();
        assert_eq!(out, (0..7).collect::<Vec<_>>());
        assert_eq!(stats.batch_count, 4);
        assert_eq!(stats.max_active, 1);
        assert_eq!(dispatcher.config().chunk_size, 100);
        assert!(dispatcher.with_config(config(0, 2)).is_err());
    }
}
