//! Bounded-concurrency batch worker pool
//!
//! Refs are processed in batches of `limit`: every ref of a batch gets its own
//! task, and the next batch starts only after the whole batch has finished.
//! Results come back in input order, failures as `None` at their own index.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::domain::errors::{CrawlError, CrawlResult};
use crate::domain::product::ProductRef;

/// Work done for one product reference
#[async_trait]
pub trait ProductWorker: Send + Sync + 'static {
    type Output: Send + 'static;

    async fn run(&self, product: ProductRef) -> CrawlResult<Self::Output>;
}

/// A slot that produced no value
#[derive(Debug, Clone)]
pub struct SlotFailure {
    pub index: usize,
    pub url: String,
    pub error: CrawlError,
}

#[derive(Debug)]
pub struct PoolResult<T> {
    /// One entry per input ref, in input order
    pub slots: Vec<Option<T>>,
    pub failures: Vec<SlotFailure>,
    pub batches_run: usize,
    /// Category-fatal error that stopped further batches
    pub halted_by: Option<CrawlError>,
}

impl<T> PoolResult<T> {
    pub fn succeeded(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_halted(&self) -> bool {
        self.halted_by.is_some()
    }

    /// Successful values in input order
    pub fn into_values(self) -> Vec<T> {
        self.slots.into_iter().flatten().collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchWorkerPool {
    limit: NonZeroUsize,
}

impl BatchWorkerPool {
    pub fn new(limit: NonZeroUsize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit.get()
    }

    pub async fn process<W: ProductWorker>(
        &self,
        worker: Arc<W>,
        products: &[ProductRef],
    ) -> PoolResult<W::Output> {
        let limit = self.limit.get();
        let mut slots = Vec::with_capacity(products.len());
        let mut failures = Vec::new();
        let mut halted_by = None;
        let mut batches_run = 0;

        for (batch_index, batch) in products.chunks(limit).enumerate() {
            let offset = batch_index * limit;
            debug!(
                "Batch {}: products {}..{}",
                batch_index + 1,
                offset,
                offset + batch.len()
            );

            let batch_tasks: Vec<_> = batch
                .iter()
                .cloned()
                .map(|product| {
                    let worker = Arc::clone(&worker);
                    tokio::spawn(async move { worker.run(product).await })
                })
                .collect();

            // Barrier: every task of the batch settles before the next starts
            let batch_results = join_all(batch_tasks).await;
            batches_run += 1;

            for (position, (outcome, product)) in batch_results.into_iter().zip(batch).enumerate() {
                let index = offset + position;
                let error = match outcome {
                    Ok(Ok(value)) => {
                        slots.push(Some(value));
                        continue;
                    }
                    Ok(Err(error)) => error,
                    Err(join_error) => CrawlError::Worker {
                        url: product.detail_url.clone(),
                        reason: join_error.to_string(),
                    },
                };

                warn!("Product {} failed ({}): {}", index, product.detail_url, error);
                if error.is_category_fatal() && halted_by.is_none() {
                    halted_by = Some(error.clone());
                }
                failures.push(SlotFailure {
                    index,
                    url: product.detail_url.clone(),
                    error,
                });
                slots.push(None);
            }

            if halted_by.is_some() {
                info!(
                    "Pool halted after batch {}; {} products not started",
                    batch_index + 1,
                    products.len() - slots.len()
                );
                break;
            }
        }

        slots.resize_with(products.len(), || None);

        PoolResult {
            slots,
            failures,
            batches_run,
            halted_by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{NavigationError, SchemaError};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn refs(count: usize) -> Vec<ProductRef> {
        (0..count)
            .map(|i| ProductRef::new(&format!("Product {i}"), &format!("https://shop.test/p/{i}")).unwrap())
            .collect()
    }

    fn index_of(product: &ProductRef) -> usize {
        product.detail_url.rsplit('/').next().unwrap().parse().unwrap()
    }

    /// Records peak concurrency and the order tasks started in
    #[derive(Default)]
    struct CountingWorker {
        live: AtomicUsize,
        peak: AtomicUsize,
        started: Mutex<Vec<usize>>,
        fail_at: Vec<usize>,
        fatal_at: Option<usize>,
    }

    #[async_trait]
    impl ProductWorker for CountingWorker {
        type Output = String;

        async fn run(&self, product: ProductRef) -> CrawlResult<String> {
            let index = index_of(&product);
            self.started.lock().unwrap().push(index);
            let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            // Later items finish first to prove ordering comes from slots
            tokio::time::sleep(Duration::from_millis(5 * (20 - index as u64 % 20))).await;
            self.live.fetch_sub(1, Ordering::SeqCst);

            if self.fail_at.contains(&index) {
                return Err(NavigationError::load_failed(&product.detail_url, "timeout").into());
            }
            if self.fatal_at == Some(index) {
                return Err(SchemaError::violation("cpu", "Unknown Spec").into());
            }
            Ok(product.normalized_name)
        }
    }

    fn pool(limit: usize) -> BatchWorkerPool {
        BatchWorkerPool::new(NonZeroUsize::new(limit).unwrap())
    }

    #[tokio::test]
    async fn twelve_refs_with_limit_five_run_three_batches() {
        let worker = Arc::new(CountingWorker::default());
        let result = pool(5).process(Arc::clone(&worker), &refs(12)).await;

        assert_eq!(result.batches_run, 3);
        assert_eq!(result.slots.len(), 12);
        assert!(worker.peak.load(Ordering::SeqCst) <= 5);
        let expected: Vec<_> = (0..12).map(|i| Some(format!("Product {i}"))).collect();
        assert_eq!(result.slots, expected);
        assert!(result.failures.is_empty());
        assert!(!result.is_halted());
    }

    #[tokio::test]
    async fn batches_are_barriers() {
        let worker = Arc::new(CountingWorker::default());
        pool(5).process(Arc::clone(&worker), &refs(12)).await;

        let started = worker.started.lock().unwrap().clone();
        let mut first: Vec<_> = started[..5].to_vec();
        let mut second: Vec<_> = started[5..10].to_vec();
        first.sort_unstable();
        second.sort_unstable();
        assert_eq!(first, vec![0, 1, 2, 3, 4]);
        assert_eq!(second, vec![5, 6, 7, 8, 9]);
    }

    #[tokio::test]
    async fn failing_worker_leaves_none_at_its_own_index() {
        let worker = Arc::new(CountingWorker {
            fail_at: vec![3, 7],
            ..CountingWorker::default()
        });
        let result = pool(5).process(worker, &refs(12)).await;

        assert_eq!(result.slots.len(), 12);
        for (i, slot) in result.slots.iter().enumerate() {
            assert_eq!(slot.is_none(), i == 3 || i == 7, "slot {i}");
        }
        let failed: Vec<_> = result.failures.iter().map(|f| f.index).collect();
        assert_eq!(failed, vec![3, 7]);
        assert_eq!(result.failures[0].url, "https://shop.test/p/3");
        assert_eq!(result.succeeded(), 10);
        assert!(!result.is_halted());
    }

    #[tokio::test]
    async fn category_fatal_error_stops_later_batches() {
        let worker = Arc::new(CountingWorker {
            fatal_at: Some(6),
            ..CountingWorker::default()
        });
        let result = pool(5).process(Arc::clone(&worker), &refs(12)).await;

        assert_eq!(result.batches_run, 2);
        assert!(result.is_halted());
        assert_eq!(result.slots.len(), 12);
        // the rest of the halting batch still completed
        assert!(result.slots[5].is_some() && result.slots[9].is_some());
        assert!(result.slots[10..].iter().all(Option::is_none));
        assert_eq!(worker.started.lock().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn panicking_task_becomes_worker_error() {
        struct PanicWorker;

        #[async_trait]
        impl ProductWorker for PanicWorker {
            type Output = ();

            async fn run(&self, product: ProductRef) -> CrawlResult<()> {
                if product.detail_url.ends_with("/1") {
                    panic!("boom");
                }
                Ok(())
            }
        }

        let result = pool(2).process(Arc::new(PanicWorker), &refs(3)).await;
        assert_eq!(result.slots, vec![Some(()), None, Some(())]);
        assert!(matches!(result.failures[0].error, CrawlError::Worker { .. }));
    }

    #[tokio::test]
    async fn empty_input_runs_no_batches() {
        let result = pool(5).process(Arc::new(CountingWorker::default()), &[]).await;
        assert_eq!(result.batches_run, 0);
        assert!(result.slots.is_empty());
    }
}
