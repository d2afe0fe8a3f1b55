//! Integration tests for batch orchestration.

#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use avitag::classify::{FallbackClassifier, LocalImage, PrimaryClassifier, RawEntry};
use avitag::config::RegionConfig;
use avitag::error::{Error, Result};
use avitag::fetch::ImageFetcher;
use avitag::filter::{ConfidenceGate, GeoFilter};
use avitag::pipeline::{
    AttributionPipeline, BatchRunner, FallbackThrottle, FilterSet, Pacing,
};
use avitag::store::{AttributionRecord, AttributionStore, ImageTask};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn entry(species: &str, confidence: f64) -> RawEntry {
    RawEntry {
        species: Some(species.to_string()),
        confidence: Some(confidence),
        detail: None,
    }
}

fn task(id: &str) -> ImageTask {
    ImageTask {
        id: id.to_string(),
        image_url: format!("https://images.example/{id}.jpg"),
        taken_on: None,
    }
}

/// In-memory store shared between the runner and the test assertions.
#[derive(Clone, Default)]
struct InMemoryStore {
    tasks: Arc<Mutex<Vec<ImageTask>>>,
    records: Arc<Mutex<Vec<AttributionRecord>>>,
    fail_species: Arc<Mutex<Option<String>>>,
}

impl InMemoryStore {
    fn with_tasks(tasks: Vec<ImageTask>) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(tasks)),
            ..Self::default()
        }
    }

    fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl AttributionStore for InMemoryStore {
    async fn fetch_unattributed(&self, limit: usize) -> Result<Vec<ImageTask>> {
        let records = self.records.lock().unwrap();
        let attributed: Vec<String> = records.iter().map(|r| r.image_id.clone()).collect();
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| !attributed.contains(&t.id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn upsert(&self, record: &AttributionRecord) -> Result<()> {
        if self
            .fail_species
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|s| s == record.species)
        {
            return Err(Error::StoreResponse {
                status: 500,
                body: "simulated store fault".to_string(),
            });
        }

        let mut records = self.records.lock().unwrap();
        // Idempotent replacement on the record key.
        records.retain(|r| {
            !(r.image_id == record.image_id
                && r.species == record.species
                && r.model_version == record.model_version)
        });
        records.push(record.clone());
        Ok(())
    }
}

/// Fetcher that succeeds unless the URL is marked broken.
struct FakeFetcher {
    broken_urls: Vec<String>,
}

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, _dest: &Path) -> Result<()> {
        if self.broken_urls.iter().any(|b| b == url) {
            return Err(Error::ImageDownload {
                url: url.to_string(),
                source: "HTTP 404".into(),
            });
        }
        Ok(())
    }
}

/// Primary classifier answering from a fixed per-image table.
struct TablePrimary {
    by_image: HashMap<String, Vec<RawEntry>>,
}

#[async_trait]
impl PrimaryClassifier for TablePrimary {
    async fn classify(
        &self,
        images: &[LocalImage],
        _region: &RegionConfig,
    ) -> Result<HashMap<String, Vec<RawEntry>>> {
        let mut out = HashMap::new();
        for image in images {
            if let Some(entries) = self.by_image.get(&image.image_id) {
                out.insert(image.image_id.clone(), entries.clone());
            }
        }
        Ok(out)
    }
}

/// Fallback that rate-limits on every call.
struct RateLimitedFallback {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl FallbackClassifier for RateLimitedFallback {
    async fn identify(&self, _image_url: &str, _region_name: &str) -> Result<Vec<RawEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::FallbackRateLimited)
    }
}

fn filters() -> FilterSet {
    FilterSet::new(
        GeoFilter::unrestricted(),
        ConfidenceGate::new(0.30),
        "Bird",
    )
}

fn runner(
    store: InMemoryStore,
    fetcher: FakeFetcher,
    primary: TablePrimary,
    fallback: Option<Box<dyn FallbackClassifier>>,
    batch_size: usize,
) -> BatchRunner {
    let pipeline = AttributionPipeline::new(
        Box::new(primary),
        fallback,
        filters(),
        RegionConfig::default(),
        FallbackThrottle::new(Duration::ZERO),
        Duration::ZERO,
    );
    BatchRunner::new(
        Box::new(store),
        Box::new(fetcher),
        pipeline,
        "speciesnet-ensemble".to_string(),
        batch_size,
        Arc::new(AtomicBool::new(false)),
        false,
    )
    .with_pacing(Pacing {
        image_cooloff: Duration::ZERO,
        batch_pause: Duration::ZERO,
    })
}

#[tokio::test]
async fn download_failure_does_not_abort_the_batch() {
    let store = InMemoryStore::with_tasks(vec![task("a"), task("b"), task("c")]);
    let fetcher = FakeFetcher {
        broken_urls: vec!["https://images.example/b.jpg".to_string()],
    };
    let primary = TablePrimary {
        by_image: HashMap::from([
            ("a".to_string(), vec![entry("American Robin", 0.9)]),
            ("b".to_string(), vec![entry("Blue Jay", 0.9)]),
            ("c".to_string(), vec![entry("House Finch", 0.9)]),
        ]),
    };

    let mut runner = runner(store.clone(), fetcher, primary, None, 10);
    let summary = runner.run_batch().await.unwrap();

    assert!(summary.success);
    assert_eq!(summary.images_processed, 3);
    assert_eq!(summary.attributions_created, 2);
    assert_eq!(store.record_count(), 2);
}

#[tokio::test]
async fn rerun_is_idempotent_once_images_are_attributed() {
    let store = InMemoryStore::with_tasks(vec![task("a")]);
    let primary_table = HashMap::from([("a".to_string(), vec![entry("American Robin", 0.9)])]);

    let mut first = runner(
        store.clone(),
        FakeFetcher { broken_urls: vec![] },
        TablePrimary {
            by_image: primary_table.clone(),
        },
        None,
        10,
    );
    first.run_batch().await.unwrap();
    assert_eq!(store.record_count(), 1);

    // The second run fetches nothing: the image is attributed already.
    let mut second = runner(
        store.clone(),
        FakeFetcher { broken_urls: vec![] },
        TablePrimary {
            by_image: primary_table,
        },
        None,
        10,
    );
    let summary = second.run_batch().await.unwrap();
    assert_eq!(summary.images_processed, 0);
    assert_eq!(store.record_count(), 1);
}

#[tokio::test]
async fn rate_limit_disables_fallback_for_the_rest_of_the_batch() {
    // Both images stay generic; the first fallback call is rate limited,
    // so the second image must not trigger another call.
    let store = InMemoryStore::with_tasks(vec![task("a"), task("b")]);
    let primary = TablePrimary {
        by_image: HashMap::from([
            ("a".to_string(), vec![entry("Bird", 0.95)]),
            ("b".to_string(), vec![entry("Bird", 0.95)]),
        ]),
    };
    let fallback_calls = Arc::new(AtomicUsize::new(0));
    let fallback = RateLimitedFallback {
        calls: Arc::clone(&fallback_calls),
    };

    let mut runner = runner(
        store.clone(),
        FakeFetcher { broken_urls: vec![] },
        primary,
        Some(Box::new(fallback)),
        10,
    );
    let summary = runner.run_batch().await.unwrap();

    assert_eq!(summary.images_processed, 2);
    assert_eq!(summary.attributions_created, 0);
    assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn persistence_fault_spares_sibling_records() {
    let store = InMemoryStore::with_tasks(vec![task("a")]);
    *store.fail_species.lock().unwrap() = Some("Blue Jay".to_string());

    let primary = TablePrimary {
        by_image: HashMap::from([(
            "a".to_string(),
            vec![entry("American Robin", 0.9), entry("Blue Jay", 0.8)],
        )]),
    };

    let mut runner = runner(
        store.clone(),
        FakeFetcher { broken_urls: vec![] },
        primary,
        None,
        10,
    );
    let summary = runner.run_batch().await.unwrap();

    assert!(summary.success);
    assert_eq!(summary.attributions_created, 1);
    assert_eq!(store.record_count(), 1);
    assert_eq!(store.records.lock().unwrap()[0].species, "American Robin");
}

#[tokio::test]
async fn continuous_mode_drains_all_unattributed_images() {
    let store = InMemoryStore::with_tasks(vec![task("a"), task("b"), task("c")]);
    let primary = TablePrimary {
        by_image: HashMap::from([
            ("a".to_string(), vec![entry("American Robin", 0.9)]),
            ("b".to_string(), vec![entry("Blue Jay", 0.9)]),
            ("c".to_string(), vec![entry("House Finch", 0.9)]),
        ]),
    };

    let mut runner = runner(
        store.clone(),
        FakeFetcher { broken_urls: vec![] },
        primary,
        None,
        2, // force multiple batches
    );
    let summary = runner.run_continuous().await.unwrap();

    assert!(summary.success);
    assert_eq!(summary.images_processed, 3);
    assert_eq!(summary.attributions_created, 3);
    assert_eq!(summary.batches_processed, Some(2));
    assert_eq!(store.record_count(), 3);
}

#[tokio::test]
async fn upsert_key_makes_duplicate_writes_replacements() {
    let store = InMemoryStore::default();
    let record = AttributionRecord {
        image_id: "a".to_string(),
        species: "American Robin".to_string(),
        confidence: 0.9,
        model_version: "speciesnet-ensemble".to_string(),
        extra: None,
    };

    store.upsert(&record).await.unwrap();
    store.upsert(&record).await.unwrap();

    assert_eq!(store.record_count(), 1);
}
