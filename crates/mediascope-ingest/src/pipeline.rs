//! Batch ingestion pipeline.
//!
//! A batch of scraped items is processed by a bounded set of tasks. Each
//! item goes through:
//! 1. Dedup gate (skip media whose page is already indexed)
//! 2. Remote feature extraction
//! 3. Result validation and vector decoding
//! 4. Conditional insert
//!
//! Item failures are counted and logged, never propagated. Only
//! cancellation fails the batch.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use mediascope_core::config::MediascopeConfig;
use mediascope_core::error::{MediaError, Result};
use mediascope_core::types::{BatchOutcome, InsertOutcome, MediaInput, ScrapedItem, VectorDimensions};
use mediascope_storage::MediaStore;

use crate::dedup::DedupGate;
use crate::extraction::{self, FeatureExtractor};

/// Tunables for [`BatchProcessor`].
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub dimensions: VectorDimensions,
    /// Maximum number of items in flight.
    pub concurrency: usize,
    pub apply_denoising: bool,
    pub batch_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &MediascopeConfig) -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            dimensions: config.storage.dimensions(),
            concurrency: resolve_concurrency(
                config.ingest.concurrency_limit,
                config.storage.max_connections,
                parallelism,
            ),
            apply_denoising: config.extractor.apply_denoising,
            batch_timeout: Duration::from_secs(config.ingest.batch_timeout_secs),
        }
    }
}

/// Effective concurrency bound.
///
/// A configured value wins, otherwise twice the hardware parallelism. Either
/// way the bound is capped so one storage connection stays free for search.
pub fn resolve_concurrency(configured: usize, pool_size: usize, parallelism: usize) -> usize {
    let ceiling = pool_size.saturating_sub(1).max(1);
    if configured > 0 {
        if configured > ceiling {
            warn!(
                configured,
                pool_size,
                ceiling,
                "ingest.concurrency_limit leaves no storage connection for search, clamping"
            );
        }
        return configured.min(ceiling);
    }
    (parallelism.max(1) * 2).min(ceiling)
}

/// How one item ended.
#[derive(Debug)]
pub enum ItemOutcome {
    Processed,
    Skipped,
    Failed(MediaError),
}

/// Processes scraped batches into stored vectors.
#[derive(Clone)]
pub struct BatchProcessor {
    gate: DedupGate,
    store: Arc<dyn MediaStore>,
    extractor: Arc<dyn FeatureExtractor>,
    settings: PipelineSettings,
}

impl BatchProcessor {
    pub fn new(
        store: Arc<dyn MediaStore>,
        extractor: Arc<dyn FeatureExtractor>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            gate: DedupGate::new(Arc::clone(&store)),
            store,
            extractor,
            settings: PipelineSettings {
                concurrency: settings.concurrency.max(1),
                ..settings
            },
        }
    }

    /// Process a batch under the configured deadline.
    pub async fn process_batch(&self, job_id: &str, items: Vec<ScrapedItem>) -> Result<BatchOutcome> {
        let timeout = self.settings.batch_timeout;
        self.process_batch_until(job_id, items, tokio::time::sleep(timeout))
            .await
            .map_err(|e| match e {
                MediaError::Cancelled(_) => MediaError::Cancelled(format!(
                    "batch {} exceeded its {}s deadline",
                    job_id,
                    timeout.as_secs()
                )),
                other => other,
            })
    }

    /// Process a batch until it completes or `cancel` resolves.
    ///
    /// On cancellation in-flight items are aborted; records already inserted
    /// are kept.
    pub async fn process_batch_until<F>(
        &self,
        job_id: &str,
        items: Vec<ScrapedItem>,
        cancel: F,
    ) -> Result<BatchOutcome>
    where
        F: Future<Output = ()> + Send,
    {
        let received = items.len();
        info!(job_id, items = received, concurrency = self.settings.concurrency, "Batch started");

        tokio::select! {
            outcome = self.run(job_id, items) => {
                info!(
                    job_id,
                    received = outcome.items_received,
                    processed = outcome.items_processed,
                    skipped = outcome.items_skipped,
                    failed = outcome.items_failed,
                    "Batch finished"
                );
                Ok(outcome)
            }
            _ = cancel => {
                warn!(job_id, items = received, "Batch cancelled, abandoning remaining items");
                Err(MediaError::Cancelled(format!("batch {} cancelled", job_id)))
            }
        }
    }

    async fn run(&self, job_id: &str, items: Vec<ScrapedItem>) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            items_received: items.len(),
            ..BatchOutcome::default()
        };
        if items.is_empty() {
            return outcome;
        }

        let job_id: Arc<str> = Arc::from(job_id);
        let tasks = items.into_iter().map(|item| {
            let this = self.clone();
            let job_id = Arc::clone(&job_id);
            async move { this.process_item(&job_id, item).await }
        });

        run_bounded(tasks, self.settings.concurrency, |joined| match joined {
            Ok(ItemOutcome::Processed) => outcome.items_processed += 1,
            Ok(ItemOutcome::Skipped) => outcome.items_skipped += 1,
            Ok(ItemOutcome::Failed(_)) => outcome.items_failed += 1,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Item task aborted");
                outcome.items_failed += 1;
            }
        })
        .await;
        outcome
    }

    /// Run one item to completion. Never returns an error; failures are
    /// logged here and reported as [`ItemOutcome::Failed`].
    pub async fn process_item(&self, job_id: &str, item: ScrapedItem) -> ItemOutcome {
        match self.try_process_item(&item).await {
            Ok(InsertOutcome::Inserted) => {
                debug!(job_id, page_url = %item.page_url, media_type = %item.media_class, "Item stored");
                ItemOutcome::Processed
            }
            Ok(InsertOutcome::AlreadyPresent) => ItemOutcome::Skipped,
            Err(e) => {
                warn!(
                    job_id,
                    page_url = %item.page_url,
                    media_url = %item.media_url,
                    media_type = %item.media_class,
                    kind = e.kind(),
                    error = %e,
                    "Item failed"
                );
                ItemOutcome::Failed(e)
            }
        }
    }

    async fn try_process_item(&self, item: &ScrapedItem) -> Result<InsertOutcome> {
        if item.page_url.trim().is_empty() {
            return Err(MediaError::InvalidInput("page_url must not be empty".to_string()));
        }
        if item.media_url.trim().is_empty() {
            return Err(MediaError::InvalidInput("media_url must not be empty".to_string()));
        }

        let class = item.media_class;
        if self.gate.exists(&item.page_url, class).await? {
            return Ok(InsertOutcome::AlreadyPresent);
        }

        let vector = extraction::extract_single(
            self.extractor.as_ref(),
            &MediaInput::Url(item.media_url.clone()),
            class,
            &item.page_url,
            self.settings.apply_denoising,
            self.settings.dimensions.get(class),
        )
        .await?;

        self.store
            .insert_if_absent(class, &item.page_url, &vector)
            .await
    }
}

/// Spawn one task per future, holding at most `limit` tasks at a time.
///
/// Results are handed to `on_done` as they are joined. Dropping the returned
/// future aborts every task still in the set.
async fn run_bounded<I, Fut, T>(
    futures: I,
    limit: usize,
    mut on_done: impl FnMut(std::result::Result<T, JoinError>),
) where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let limit = limit.max(1);
    let mut tasks = JoinSet::new();
    for future in futures {
        while tasks.len() >= limit {
            match tasks.join_next().await {
                Some(joined) => on_done(joined),
                None => break,
            }
        }
        tasks.spawn(future);
    }
    while let Some(joined) = tasks.join_next().await {
        on_done(joined);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{ExtractionStatus, FeatureResult};
    use crate::testing::{memory_store, MockExtractor, Reply};
    use mediascope_core::types::MediaClass;

    const DIMS: VectorDimensions = VectorDimensions { image: 3, audio: 2 };

    fn settings(concurrency: usize) -> PipelineSettings {
        PipelineSettings {
            dimensions: DIMS,
            concurrency,
            apply_denoising: false,
            batch_timeout: Duration::from_secs(30),
        }
    }

    fn image(n: usize) -> ScrapedItem {
        ScrapedItem::new(
            format!("https://site.test/page/{}", n),
            format!("https://site.test/img/{}.png", n),
            MediaClass::Image,
        )
    }

    fn images(count: usize) -> Vec<ScrapedItem> {
        (0..count).map(image).collect()
    }

    #[test]
    fn test_resolve_concurrency() {
        assert_eq!(resolve_concurrency(6, 8, 16), 6);
        assert_eq!(resolve_concurrency(0, 8, 2), 4);
        assert_eq!(resolve_concurrency(0, 8, 16), 7);
        assert_eq!(resolve_concurrency(0, 1, 4), 1);
        assert_eq!(resolve_concurrency(0, 0, 0), 1);
    }

    #[test]
    fn test_configured_concurrency_leaves_a_connection_for_search() {
        assert_eq!(resolve_concurrency(32, 4, 16), 3);
        assert_eq!(resolve_concurrency(6, 2, 16), 1);
        assert_eq!(resolve_concurrency(3, 1, 16), 1);

        let mut config = MediascopeConfig::default();
        config.ingest.concurrency_limit = 32;
        config.storage.max_connections = 4;
        let settings = PipelineSettings::from_config(&config);
        assert!(settings.concurrency < config.storage.max_connections);
        assert_eq!(settings.concurrency, 3);
    }

    #[tokio::test]
    async fn test_run_bounded_never_holds_more_than_limit() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let outstanding = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let futures = (0..1000).map(|n| {
            let outstanding = Arc::clone(&outstanding);
            let peak = Arc::clone(&peak);
            async move {
                let now = outstanding.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                n
            }
        });

        let mut joined = 0;
        run_bounded(futures, 4, |result| {
            result.unwrap();
            outstanding.fetch_sub(1, Ordering::SeqCst);
            joined += 1;
        })
        .await;

        assert_eq!(joined, 1000);
        assert!(peak.load(Ordering::SeqCst) <= 4, "peak {}", peak.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_large_batch_with_failures() {
        let extractor = Arc::new(MockExtractor::new(|url| {
            let n: usize = url
                .trim_start_matches("https://site.test/img/")
                .trim_end_matches(".png")
                .parse()
                .unwrap();
            if n % 7 == 0 {
                Reply::Status(ExtractionStatus::FailedDownload)
            } else {
                Reply::Vector(vec![1.0, 0.5, 0.25])
            }
        }));
        let store = memory_store(DIMS);
        let processor = BatchProcessor::new(Arc::clone(&store), extractor, settings(4));

        let outcome = processor.process_batch("job-big", images(700)).await.unwrap();
        assert_eq!(outcome.items_received, 700);
        assert_eq!(outcome.items_failed, 100);
        assert_eq!(outcome.items_processed, 600);
        assert_eq!(outcome.items_skipped, 0);
        assert_eq!(store.count(MediaClass::Image).await.unwrap(), 600);
    }

    #[tokio::test]
    async fn test_blank_urls_fail_before_extraction() {
        let extractor = Arc::new(MockExtractor::constant(vec![1.0, 0.0, 0.0]));
        let processor = BatchProcessor::new(memory_store(DIMS), extractor.clone(), settings(2));

        let items = vec![
            ScrapedItem::new("  ", "https://site.test/img/1.png", MediaClass::Image),
            ScrapedItem::new("https://site.test/page/2", "", MediaClass::Image),
        ];
        let outcome = processor.process_batch("job-b", items).await.unwrap();
        assert_eq!(outcome.items_failed, 2);
        assert!(extractor.calls().is_empty());

        match processor
            .process_item("job-b", ScrapedItem::new("", "https://site.test/img/3.png", MediaClass::Image))
            .await
        {
            ItemOutcome::Failed(e) => assert_eq!(e.kind(), "invalid_input"),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = MediascopeConfig::default();
        config.ingest.concurrency_limit = 3;
        config.extractor.apply_denoising = true;
        let settings = PipelineSettings::from_config(&config);
        assert_eq!(settings.concurrency, 3);
        assert!(settings.apply_denoising);
        assert_eq!(settings.dimensions, config.storage.dimensions());
        assert_eq!(settings.batch_timeout, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let extractor = Arc::new(MockExtractor::constant(vec![1.0, 0.0, 0.0]));
        let processor = BatchProcessor::new(memory_store(DIMS), extractor.clone(), settings(4));

        let outcome = processor.process_batch("job-0", vec![]).await.unwrap();
        assert_eq!(outcome, BatchOutcome::default());
        assert!(extractor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_batch_with_existing_pages() {
        let store = memory_store(DIMS);
        for n in [1, 3] {
            store
                .insert_if_absent(MediaClass::Image, &image(n).page_url, &[0.0, 1.0, 0.0])
                .await
                .unwrap();
        }
        let extractor = Arc::new(MockExtractor::constant(vec![1.0, 0.0, 0.0]));
        let processor = BatchProcessor::new(Arc::clone(&store), extractor.clone(), settings(4));

        let outcome = processor.process_batch("job-8", images(5)).await.unwrap();
        assert_eq!(outcome.items_received, 5);
        assert_eq!(outcome.items_processed, 3);
        assert_eq!(outcome.items_skipped, 2);
        assert_eq!(outcome.items_failed, 0);

        // The gate stopped extraction for the indexed pages.
        let calls = extractor.calls();
        assert_eq!(calls.len(), 3);
        assert!(!calls.contains(&image(1).media_url));
        assert!(!calls.contains(&image(3).media_url));

        assert_eq!(store.count(MediaClass::Image).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_item_failures_are_isolated() {
        let extractor = Arc::new(MockExtractor::new(|url| {
            if url.ends_with("/1.png") {
                Reply::Status(ExtractionStatus::FailedDownload)
            } else if url.ends_with("/2.png") {
                Reply::Vector(vec![1.0, 0.0]) // wrong dimensionality
            } else if url.ends_with("/3.png") {
                Reply::Results(vec![])
            } else if url.ends_with("/4.png") {
                Reply::Vector(vec![f32::NAN, 0.0, 0.0])
            } else if url.ends_with("/5.png") {
                Reply::Results(vec![FeatureResult::success(url, &[])])
            } else {
                Reply::Vector(vec![1.0, 0.0, 0.0])
            }
        }));
        let store = memory_store(DIMS);
        let processor = BatchProcessor::new(Arc::clone(&store), extractor, settings(3));

        let outcome = processor.process_batch("job-f", images(8)).await.unwrap();
        assert_eq!(outcome.items_received, 8);
        assert_eq!(outcome.items_failed, 5);
        assert_eq!(outcome.items_processed, 3);
        assert_eq!(outcome.items_skipped, 0);
        assert_eq!(store.count(MediaClass::Image).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_item_outcome_carries_error() {
        let extractor = Arc::new(MockExtractor::new(|_| {
            Reply::Status(ExtractionStatus::FailedProcessing)
        }));
        let processor = BatchProcessor::new(memory_store(DIMS), extractor, settings(1));

        match processor.process_item("job", image(0)).await {
            ItemOutcome::Failed(e) => assert_eq!(e.kind(), "remote_extraction_failure"),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_panicking_item_counts_as_failed() {
        let extractor = Arc::new(MockExtractor::new(|url| {
            if url.ends_with("/0.png") {
                Reply::Panic
            } else {
                Reply::Vector(vec![0.0, 0.0, 1.0])
            }
        }));
        let processor = BatchProcessor::new(memory_store(DIMS), extractor, settings(2));

        let outcome = processor.process_batch("job-p", images(4)).await.unwrap();
        assert_eq!(outcome.items_failed, 1);
        assert_eq!(outcome.items_processed, 3);
    }

    #[tokio::test]
    async fn test_concurrency_bound_respected() {
        let extractor = Arc::new(
            MockExtractor::constant(vec![1.0, 1.0, 1.0]).with_delay(Duration::from_millis(20)),
        );
        let processor = BatchProcessor::new(memory_store(DIMS), extractor.clone(), settings(4));

        let outcome = processor.process_batch("job-c", images(40)).await.unwrap();
        assert_eq!(outcome.items_processed, 40);
        assert!(extractor.max_in_flight() <= 4, "saw {}", extractor.max_in_flight());
        assert!(extractor.max_in_flight() >= 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_duplicate_items_in_one_batch_store_once() {
        let extractor = Arc::new(
            MockExtractor::constant(vec![1.0, 0.0, 0.0]).with_delay(Duration::from_millis(10)),
        );
        let store = memory_store(DIMS);
        let processor = BatchProcessor::new(Arc::clone(&store), extractor, settings(8));

        let items = vec![image(7); 6];
        let outcome = processor.process_batch("job-d", items).await.unwrap();
        assert_eq!(outcome.items_processed, 1);
        assert_eq!(outcome.items_skipped, 5);
        assert_eq!(store.count(MediaClass::Image).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_keeps_completed_inserts() {
        let extractor = Arc::new(MockExtractor::new(|url| {
            if url.ends_with("/0.png") || url.ends_with("/1.png") {
                Reply::Vector(vec![1.0, 0.0, 0.0])
            } else {
                Reply::Hang
            }
        }));
        let store = memory_store(DIMS);
        let processor = BatchProcessor::new(Arc::clone(&store), extractor, settings(2));

        let err = processor
            .process_batch_until("job-x", images(6), tokio::time::sleep(Duration::from_millis(200)))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Cancelled(_)));
        assert_eq!(store.count(MediaClass::Image).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_deadline_reports_cancelled() {
        let extractor = Arc::new(MockExtractor::new(|_| Reply::Hang));
        let processor = BatchProcessor::new(
            memory_store(DIMS),
            extractor,
            PipelineSettings {
                batch_timeout: Duration::from_millis(50),
                ..settings(2)
            },
        );

        let err = processor.process_batch("job-t", images(3)).await.unwrap_err();
        assert_eq!(err.kind(), "cancelled");
        assert!(err.to_string().contains("deadline"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;
        use std::collections::HashSet;

        #[derive(Debug, Clone, Copy, PartialEq)]
        enum Kind {
            Existing,
            Failing,
            Fresh,
        }

        fn kind_strategy() -> impl Strategy<Value = Kind> {
            prop_oneof![Just(Kind::Existing), Just(Kind::Failing), Just(Kind::Fresh)]
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(24))]

            #[test]
            fn test_batch_counts_add_up(
                kinds in prop::collection::vec(kind_strategy(), 0..40),
                concurrency in 1usize..6,
            ) {
                let failing: HashSet<String> = kinds
                    .iter()
                    .enumerate()
                    .filter(|(_, kind)| **kind == Kind::Failing)
                    .map(|(n, _)| image(n).media_url)
                    .collect();
                let extractor = Arc::new(MockExtractor::new(move |url| {
                    if failing.contains(url) {
                        Reply::Status(ExtractionStatus::FailedProcessing)
                    } else {
                        Reply::Vector(vec![0.0, 1.0, 0.0])
                    }
                }));

                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                let outcome = runtime.block_on(async {
                    let store = memory_store(DIMS);
                    for (n, kind) in kinds.iter().enumerate() {
                        if *kind == Kind::Existing {
                            store
                                .insert_if_absent(MediaClass::Image, &image(n).page_url, &[1.0, 0.0, 0.0])
                                .await
                                .unwrap();
                        }
                    }
                    let processor = BatchProcessor::new(store, extractor, settings(concurrency));
                    processor.process_batch("job-prop", images(kinds.len())).await.unwrap()
                });

                let count = |wanted: Kind| kinds.iter().filter(|k| **k == wanted).count();
                prop_assert_eq!(outcome.items_received, kinds.len());
                prop_assert_eq!(
                    outcome.items_processed + outcome.items_failed + outcome.items_skipped,
                    outcome.items_received
                );
                prop_assert_eq!(
                    outcome.items_received - (outcome.items_processed + outcome.items_failed),
                    outcome.items_skipped
                );
                prop_assert_eq!(outcome.items_skipped, count(Kind::Existing));
                prop_assert_eq!(outcome.items_failed, count(Kind::Failing));
                prop_assert_eq!(outcome.items_processed, count(Kind::Fresh));
            }
        }
    }
}
