//! Batch pool shape and ordering for arbitrary input sizes

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use catalog_crawler::application::{BatchWorkerPool, ProductWorker};
use catalog_crawler::domain::{CrawlResult, NavigationError, ProductRef};
use proptest::prelude::*;

struct EchoWorker {
    live: AtomicUsize,
    peak: AtomicUsize,
    fail_every: usize,
}

#[async_trait]
impl ProductWorker for EchoWorker {
    type Output = String;

    async fn run(&self, product: ProductRef) -> CrawlResult<String> {
        let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.live.fetch_sub(1, Ordering::SeqCst);

        let index: usize = product.normalized_name.parse().unwrap_or_default();
        if self.fail_every > 0 && index % self.fail_every == 0 {
            return Err(NavigationError::load_failed(&product.detail_url, "refused").into());
        }
        Ok(product.normalized_name)
    }
}

fn refs(count: usize) -> Vec<ProductRef> {
    (0..count)
        .map(|i| ProductRef::new(&i.to_string(), &format!("https://shop.test/p/{i}")).unwrap())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn output_matches_input_shape(count in 0usize..40, limit in 1usize..9, fail_every in 0usize..5) {
        let worker = Arc::new(EchoWorker {
            live: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            fail_every,
        });
        let pool = BatchWorkerPool::new(NonZeroUsize::new(limit).unwrap());

        let result = tokio_test::block_on(pool.process(Arc::clone(&worker), &refs(count)));

        prop_assert_eq!(result.slots.len(), count);
        prop_assert_eq!(result.batches_run, count.div_ceil(limit));
        prop_assert!(worker.peak.load(Ordering::SeqCst) <= limit);
        for (index, slot) in result.slots.iter().enumerate() {
            let should_fail = fail_every > 0 && index % fail_every == 0;
            match slot {
                Some(value) => {
                    prop_assert!(!should_fail);
                    prop_assert_eq!(value, &index.to_string());
                }
                None => prop_assert!(should_fail),
            }
        }
        prop_assert_eq!(result.failures.len() + result.succeeded(), count);
    }
}
