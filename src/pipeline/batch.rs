//! Batch orchestration across images.

use super::attribution::AttributionPipeline;
use crate::classify::LocalImage;
use crate::error::Result;
use crate::fetch::ImageFetcher;
use crate::progress;
use crate::store::{AttributionRecord, AttributionStore, ImageTask};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};

/// Aggregate result of a batch (or continuous) run.
#[derive(Debug, Serialize)]
pub struct BatchSummary {
    /// Whether the run completed without a batch-level fault.
    pub success: bool,
    /// Number of images attempted.
    pub images_processed: u64,
    /// Number of attribution records persisted.
    pub attributions_created: u64,
    /// Number of batches run (continuous mode only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batches_processed: Option<u64>,
    /// Human-readable outcome.
    pub message: String,
}

/// Inter-operation pacing intervals. Overridable so tests run without
/// real sleeps.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    /// Cooloff between images within a batch.
    pub image_cooloff: Duration,
    /// Pause between batches in continuous mode.
    pub batch_pause: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            image_cooloff: crate::constants::DOWNLOAD_COOLOFF,
            batch_pause: crate::constants::BATCH_PAUSE,
        }
    }
}

/// Applies the attribution pipeline across batches of images.
pub struct BatchRunner {
    store: Box<dyn AttributionStore>,
    fetcher: Box<dyn ImageFetcher>,
    pipeline: AttributionPipeline,
    model_version: String,
    batch_size: usize,
    shutdown: Arc<AtomicBool>,
    progress_enabled: bool,
    pacing: Pacing,
}

impl BatchRunner {
    /// Assemble a runner.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Box<dyn AttributionStore>,
        fetcher: Box<dyn ImageFetcher>,
        pipeline: AttributionPipeline,
        model_version: String,
        batch_size: usize,
        shutdown: Arc<AtomicBool>,
        progress_enabled: bool,
    ) -> Self {
        Self {
            store,
            fetcher,
            pipeline,
            model_version,
            batch_size,
            shutdown,
            progress_enabled,
            pacing: Pacing::default(),
        }
    }

    /// Override pacing intervals.
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Run a single batch of image attributions.
    pub async fn run_batch(&mut self) -> Result<BatchSummary> {
        info!("Starting bird attribution batch");

        let tasks = self.store.fetch_unattributed(self.batch_size).await?;
        if tasks.is_empty() {
            info!("No images to attribute");
            return Ok(BatchSummary {
                success: true,
                images_processed: 0,
                attributions_created: 0,
                batches_processed: None,
                message: "No images to attribute".to_string(),
            });
        }

        info!("Found {} image(s) to classify", tasks.len());

        let staging = tempfile::tempdir()?;
        let bar = progress::create_batch_progress(tasks.len(), self.progress_enabled);

        let mut images_processed: u64 = 0;
        let mut attributions_created: u64 = 0;
        let mut fallback_available = true;

        for (idx, task) in tasks.iter().enumerate() {
            if self.shutdown.load(Ordering::SeqCst) {
                info!("Stop requested, ending batch after {idx} image(s)");
                break;
            }

            images_processed += 1;
            match self
                .process_task(task, staging.path(), fallback_available)
                .await
            {
                Ok(result) => {
                    attributions_created += result.created;
                    if result.fallback_rate_limited {
                        warn!("Fallback rate limited, disabling fallback for this batch");
                        fallback_available = false;
                    }
                }
                Err(e) => {
                    error!("Failed to process image {}: {e}", task.id);
                }
            }

            progress::inc_progress(bar.as_ref());
            if idx < tasks.len() - 1 && !self.pacing.image_cooloff.is_zero() {
                tokio::time::sleep(self.pacing.image_cooloff).await;
            }
        }

        progress::finish_progress(bar, "Batch complete");
        info!(
            "Batch complete: {images_processed} image(s) processed, {attributions_created} attribution(s) created"
        );

        Ok(BatchSummary {
            success: true,
            images_processed,
            attributions_created,
            batches_processed: None,
            message: format!(
                "Processed {images_processed} images, created {attributions_created} attributions"
            ),
        })
    }

    /// Continuous mode: repeat batches until no unattributed images remain.
    pub async fn run_continuous(&mut self) -> Result<BatchSummary> {
        info!("Continuous mode: processing all unattributed images");

        let mut total_processed: u64 = 0;
        let mut total_attributions: u64 = 0;
        let mut batches: u64 = 0;

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                info!("Stop requested, ending continuous run");
                break;
            }

            let summary = self.run_batch().await?;
            if summary.images_processed == 0 {
                info!("All images have been attributed");
                break;
            }

            total_processed += summary.images_processed;
            total_attributions += summary.attributions_created;
            batches += 1;
            info!("Progress: {total_processed} image(s) processed so far");

            if !self.pacing.batch_pause.is_zero() {
                tokio::time::sleep(self.pacing.batch_pause).await;
            }
        }

        Ok(BatchSummary {
            success: true,
            images_processed: total_processed,
            attributions_created: total_attributions,
            batches_processed: Some(batches),
            message: format!(
                "Processed {total_processed} images in {batches} batches, created {total_attributions} attributions"
            ),
        })
    }

    /// Download, classify, and persist one image.
    ///
    /// Records are only written after the pipeline fully resolves, so an
    /// abort between images never leaves partial records for the one in
    /// flight.
    async fn process_task(
        &mut self,
        task: &ImageTask,
        staging: &Path,
        allow_fallback: bool,
    ) -> Result<TaskResult> {
        // Each image gets its own staging folder; the classifier scans
        // whole directories.
        let image_dir = staging.join(&task.id);
        tokio::fs::create_dir_all(&image_dir).await?;
        let image_path = image_dir.join(format!("{}.jpg", task.id));

        self.fetcher.fetch(&task.image_url, &image_path).await?;

        let image = LocalImage {
            image_id: task.id.clone(),
            path: image_path,
        };
        let outcome = self
            .pipeline
            .process(&image, &task.image_url, allow_fallback)
            .await?;

        if outcome.predictions.is_empty() {
            info!("No species identified above threshold for {}", task.id);
        } else {
            info!("Predictions for {}:", task.id);
            for prediction in &outcome.predictions {
                info!(
                    "  - {} ({}): {:.2}%",
                    prediction.species,
                    prediction.source,
                    f64::from(prediction.confidence) * 100.0
                );
            }
        }

        let mut created: u64 = 0;
        for prediction in &outcome.predictions {
            let record = AttributionRecord::from_prediction(&task.id, prediction, &self.model_version);
            // Persistence faults are per-record; sibling records still land.
            match self.store.upsert(&record).await {
                Ok(()) => created += 1,
                Err(e) => error!("Failed to persist '{}' for {}: {e}", record.species, task.id),
            }
        }

        if created > 0 {
            info!("Saved {created} species attribution(s) for {}", task.id);
        }

        Ok(TaskResult {
            created,
            fallback_rate_limited: outcome.fallback_rate_limited,
        })
    }
}

struct TaskResult {
    created: u64,
    fallback_rate_limited: bool,
}
