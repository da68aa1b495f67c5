//! Pipeline orchestration - wires together all ingestion stages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{IngestError, IngestResult, ValidationError};
use crate::storage::{sanitize_display_name, ArtifactStore, FsStore, StorageWriter};
use crate::types::{
    DerivativeSpec, EncodedImage, StoredArtifact, UploadRecord, UploadRequest, ValidationResult,
};

use super::derive::DerivativeGenerator;
use super::hash::Hasher;
use super::normalize::Normalizer;
use super::pool::{run_blocking, CancelToken, WorkerPool};
use super::validate::Validator;

/// Lifecycle of one upload. Failure can happen in any stage before `Stored`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Received,
    Validated,
    Normalized,
    Derived,
    Stored,
    Committed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::Normalized => "normalized",
            Self::Derived => "derived",
            Self::Stored => "stored",
            Self::Committed => "committed",
        })
    }
}

/// The main ingestion pipeline.
///
/// Cheap to share behind an `Arc`; every upload runs independently and the
/// worker pool bounds how many are decoded at once.
pub struct IngestPipeline {
    validator: Arc<Validator>,
    normalizer: Arc<Normalizer>,
    generator: Arc<DerivativeGenerator>,
    specs: Arc<Vec<DerivativeSpec>>,
    writer: StorageWriter,
    pool: WorkerPool,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl IngestPipeline {
    /// Create a pipeline writing to the configured storage root.
    pub fn new(config: &Config) -> Self {
        Self::with_store(
            config,
            Arc::new(FsStore::new(config.storage_root())),
            Arc::new(SystemClock::new()),
        )
    }

    /// Create a pipeline with an explicit store and clock.
    pub fn with_store(config: &Config, store: Arc<dyn ArtifactStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            validator: Arc::new(Validator::new(config.limits.clone())),
            normalizer: Arc::new(Normalizer::new(config.limits.clone(), &config.storage)),
            generator: Arc::new(DerivativeGenerator::new(config.pipeline.parallel_derivatives)),
            specs: Arc::new(config.derivatives.clone()),
            writer: StorageWriter::new(store, config.limits.clone()),
            pool: WorkerPool::new(&config.pipeline),
            clock,
            timeout: Duration::from_millis(config.limits.process_timeout_ms),
        }
    }

    /// Validate an upload without processing or storing it.
    pub fn check(
        &self,
        bytes: &[u8],
        content_type: &str,
        filename: Option<&str>,
    ) -> Result<ValidationResult, ValidationError> {
        self.validator.validate(bytes, content_type, filename)
    }

    /// Run one upload through the full pipeline.
    pub async fn ingest(&self, request: UploadRequest) -> IngestResult<StoredUpload> {
        self.ingest_with_cancel(request, &CancelToken::new()).await
    }

    /// Run one upload, abandoning it if `cancel` fires before storage begins.
    ///
    /// On error nothing is left on storage. On success the artifacts are
    /// provisional until [`StoredUpload::commit`] is called.
    pub async fn ingest_with_cancel(
        &self,
        request: UploadRequest,
        cancel: &CancelToken,
    ) -> IngestResult<StoredUpload> {
        let result = self.run(request, cancel).await;
        if let Err(e) = &result {
            if e.is_rejection() {
                tracing::warn!(code = e.reason_code(), "Upload rejected: {}", e);
            } else {
                tracing::warn!(code = e.reason_code(), stage = %e.stage(), "Upload failed: {}", e);
            }
        }
        result
    }

    async fn run(&self, request: UploadRequest, cancel: &CancelToken) -> IngestResult<StoredUpload> {
        cancel.check(PipelineStage::Received)?;
        let permit = Arc::new(self.pool.acquire().await?);

        let start = Instant::now();
        let UploadRequest {
            bytes,
            content_type,
            owner_id,
            visibility,
            filename,
        } = request;
        let bytes = Arc::new(bytes);

        // Validate
        cancel.check(PipelineStage::Received)?;
        let validation = {
            let validator = self.validator.clone();
            let bytes = bytes.clone();
            let filename = filename.clone();
            let budget = self.remaining(start, PipelineStage::Received)?;
            run_blocking(PipelineStage::Received, budget, permit.clone(), move || {
                validator.validate(&bytes, &content_type, filename.as_deref())
            })
            .await??
        };
        tracing::debug!(
            format = %validation.format,
            width = validation.width,
            height = validation.height,
            "  Validate: {:?}",
            start.elapsed()
        );

        // Normalize
        cancel.check(PipelineStage::Validated)?;
        let stage_start = Instant::now();
        let normalized = {
            let normalizer = self.normalizer.clone();
            let bytes = bytes.clone();
            let kind = validation.format;
            let budget = self.remaining(start, PipelineStage::Validated)?;
            run_blocking(PipelineStage::Validated, budget, permit.clone(), move || {
                normalizer.normalize(&bytes, kind)
            })
            .await??
        };
        tracing::debug!(
            orientation = normalized.orientation.exif_value(),
            "  Normalize: {:?}",
            stage_start.elapsed()
        );

        // Derive (the sanitized original leads the set)
        cancel.check(PipelineStage::Normalized)?;
        let stage_start = Instant::now();
        let images: Vec<EncodedImage> = {
            let normalizer = self.normalizer.clone();
            let generator = self.generator.clone();
            let specs = self.specs.clone();
            let bytes = bytes.clone();
            let budget = self.remaining(start, PipelineStage::Normalized)?;
            run_blocking(PipelineStage::Normalized, budget, permit.clone(), move || {
                let original = normalizer.sanitize_original(&bytes, &normalized)?;
                let mut images = Vec::with_capacity(specs.len() + 1);
                images.push(original);
                images.extend(generator.generate(&normalized, &specs)?);
                Ok::<_, IngestError>(images)
            })
            .await??
        };
        tracing::debug!(variants = images.len(), "  Derive: {:?}", stage_start.elapsed());

        // Store. From here on the run is not interrupted; it completes or rolls back.
        cancel.check(PipelineStage::Derived)?;
        let stage_start = Instant::now();
        let timestamp = self.clock.now();
        let record = UploadRecord {
            upload_key: Hasher::upload_key(&owner_id, timestamp),
            owner_id,
            visibility,
            display_name: filename.as_deref().and_then(sanitize_display_name),
            created_at: timestamp,
            artifacts: Vec::new(),
        };
        let writer = self.writer.clone();
        // The guard is built on the blocking thread so that a dropped caller
        // future still rolls the writes back.
        let stored = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            writer
                .persist(&images, &record.owner_id, record.created_at)
                .map(|artifacts| StoredUpload::new(UploadRecord { artifacts, ..record }, writer))
        })
        .await
        .map_err(|e| IngestError::Worker(e.to_string()))??;
        tracing::debug!("  Store: {:?}", stage_start.elapsed());

        tracing::info!(
            upload_key = %stored.record().upload_key,
            artifacts = stored.record().artifacts.len(),
            "Stored upload in {:?}",
            start.elapsed()
        );
        Ok(stored)
    }

    /// Remaining share of the processing time budget.
    fn remaining(&self, start: Instant, stage: PipelineStage) -> IngestResult<Duration> {
        match self.timeout.checked_sub(start.elapsed()) {
            Some(left) if !left.is_zero() => Ok(left),
            _ => Err(IngestError::Timeout {
                stage,
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }

    /// Delete an artifact set, e.g. when the photo it belongs to is deleted.
    pub async fn remove(&self, artifacts: &[StoredArtifact]) -> IngestResult<()> {
        let writer = self.writer.clone();
        let artifacts = artifacts.to_vec();
        tokio::task::spawn_blocking(move || writer.remove(&artifacts))
            .await
            .map_err(|e| IngestError::Worker(e.to_string()))??;
        Ok(())
    }

    /// Configured derivative specs, in output order.
    pub fn derivative_specs(&self) -> &[DerivativeSpec] {
        &self.specs
    }

    /// Number of uploads that may be decoded concurrently.
    pub fn workers(&self) -> usize {
        self.pool.size()
    }
}

/// Artifacts of an upload that are on storage but not yet acknowledged.
///
/// Call [`commit`](Self::commit) once the caller has recorded the upload.
/// Dropping it uncommitted deletes the artifacts before `drop` returns. That
/// removal is blocking filesystem I/O, so on an async worker thread prefer
/// [`discard`](Self::discard) inside `spawn_blocking`, or commit.
#[must_use = "an uncommitted upload is rolled back when dropped"]
pub struct StoredUpload {
    record: UploadRecord,
    writer: StorageWriter,
    settled: bool,
}

impl StoredUpload {
    fn new(record: UploadRecord, writer: StorageWriter) -> Self {
        Self {
            record,
            writer,
            settled: false,
        }
    }

    pub fn record(&self) -> &UploadRecord {
        &self.record
    }

    pub fn artifacts(&self) -> &[StoredArtifact] {
        &self.record.artifacts
    }

    pub fn state(&self) -> PipelineStage {
        PipelineStage::Stored
    }

    /// Keep the artifacts and hand over the record.
    pub fn commit(mut self) -> UploadRecord {
        self.settled = true;
        tracing::debug!(upload_key = %self.record.upload_key, "Committed upload");
        std::mem::take(&mut self.record)
    }

    /// Commit, then delete the artifact set this upload replaces.
    ///
    /// Failure to delete the old set is logged; the new upload stays committed.
    pub fn commit_replacing(self, previous: &[StoredArtifact]) -> UploadRecord {
        let writer = self.writer.clone();
        let record = self.commit();
        if let Err(e) = writer.remove(previous) {
            tracing::warn!(upload_key = %record.upload_key, "Could not remove replaced artifacts: {}", e);
        }
        record
    }

    /// Delete the artifacts now and report any failure.
    pub fn discard(mut self) -> IngestResult<()> {
        self.settled = true;
        self.writer.remove(&self.record.artifacts)?;
        Ok(())
    }
}

impl Drop for StoredUpload {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        tracing::debug!(upload_key = %self.record.upload_key, "Rolling back uncommitted upload");
        if let Err(e) = self.writer.remove(&self.record.artifacts) {
            tracing::warn!(upload_key = %self.record.upload_key, "Rollback failed: {}", e);
        }
    }
}

impl fmt::Debug for StoredUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredUpload")
            .field("record", &self.record)
            .field("settled", &self.settled)
            .finish()
    }
}
