//! Scriptable extractor and store fixtures for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use mediascope_core::error::Result;
use mediascope_core::types::VectorDimensions;
use mediascope_storage::{Database, MediaRepository, MediaStore};

use crate::extraction::{BytesItem, ExtractionStatus, FeatureExtractor, FeatureResult, UrlItem};

pub(crate) enum Reply {
    Vector(Vec<f32>),
    Status(ExtractionStatus),
    Results(Vec<FeatureResult>),
    Panic,
    Hang,
}

type Responder = Box<dyn Fn(&str) -> Reply + Send + Sync>;

/// Extractor whose reply is chosen per media URL (or reference id).
pub(crate) struct MockExtractor {
    responder: Responder,
    delay: Duration,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockExtractor {
    pub(crate) fn new(responder: impl Fn(&str) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Always answers with `vector`.
    pub(crate) fn constant(vector: Vec<f32>) -> Self {
        Self::new(move |_| Reply::Vector(vector.clone()))
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn respond(&self, key: &str) -> Vec<FeatureResult> {
        self.calls.lock().unwrap().push(key.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let reply = (self.responder)(key);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            Reply::Vector(v) => vec![FeatureResult::success(key, &v)],
            Reply::Status(status) => vec![FeatureResult::failure(key, status, "scripted failure")],
            Reply::Results(results) => results,
            Reply::Panic => panic!("scripted extractor panic for {}", key),
            Reply::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl FeatureExtractor for MockExtractor {
    async fn process_urls(
        &self,
        items: Vec<UrlItem>,
        _apply_denoising: bool,
    ) -> Result<Vec<FeatureResult>> {
        let mut out = Vec::new();
        for item in items {
            out.extend(self.respond(&item.media_url).await);
        }
        Ok(out)
    }

    async fn process_bytes(
        &self,
        items: Vec<BytesItem>,
        _apply_denoising: bool,
    ) -> Result<Vec<FeatureResult>> {
        let mut out = Vec::new();
        for item in items {
            out.extend(self.respond(&item.reference_id).await);
        }
        Ok(out)
    }
}

/// A fresh in-memory repository with small vectors.
pub(crate) fn memory_store(dimensions: VectorDimensions) -> Arc<dyn MediaStore> {
    let db = Database::in_memory(dimensions).unwrap();
    Arc::new(MediaRepository::new(Arc::new(db)))
}
