//! All-or-nothing persistence of one upload's artifact set.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::LimitsConfig;
use crate::error::StorageError;
use crate::pipeline::decode::{sniff, ImageDecoder};
use crate::pipeline::hash::Hasher;
use crate::types::{EncodedImage, StoredArtifact};

use super::fs::ArtifactStore;
use super::path::artifact_path;

/// Writes artifact sets through an [`ArtifactStore`], verifying each write
/// and rolling back the whole set on failure.
#[derive(Clone)]
pub struct StorageWriter {
    store: Arc<dyn ArtifactStore>,
    decoder: ImageDecoder,
}

impl StorageWriter {
    pub fn new(store: Arc<dyn ArtifactStore>, limits: LimitsConfig) -> Self {
        Self {
            store,
            decoder: ImageDecoder::new(limits),
        }
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Persist `images` (original first) for one upload.
    ///
    /// Descriptors are built from the bytes read back from storage. If any
    /// write or verification fails, every artifact already written for this
    /// call is removed before the error is returned.
    pub fn persist(
        &self,
        images: &[EncodedImage],
        owner_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<StoredArtifact>, StorageError> {
        let mut written: Vec<String> = Vec::with_capacity(images.len());
        let mut stored = Vec::with_capacity(images.len());

        for image in images {
            let path = artifact_path(owner_id, timestamp, &image.variant, image.format.extension());
            match self.write_one(image, &path, &mut written) {
                Ok(artifact) => stored.push(artifact),
                Err(e) => {
                    tracing::warn!(path = %path, code = e.code(), "Storage write failed, rolling back");
                    self.rollback(&written);
                    return Err(e);
                }
            }
        }
        Ok(stored)
    }

    fn write_one(
        &self,
        image: &EncodedImage,
        path: &str,
        written: &mut Vec<String>,
    ) -> Result<StoredArtifact, StorageError> {
        self.store.put(path, &image.bytes)?;
        written.push(path.to_string());

        let bytes = self.store.read(path)?;
        self.verify(image, path, &bytes)
    }

    /// Re-decode stored bytes and describe them.
    fn verify(
        &self,
        image: &EncodedImage,
        path: &str,
        bytes: &[u8],
    ) -> Result<StoredArtifact, StorageError> {
        let verify_failed = |message: String| StorageError::VerifyFailed {
            path: path.to_string(),
            message,
        };

        if bytes.len() != image.bytes.len() {
            return Err(verify_failed(format!(
                "wrote {} bytes, read back {}",
                image.bytes.len(),
                bytes.len()
            )));
        }
        let format = sniff(bytes)
            .filter(|kind| *kind == image.format)
            .ok_or_else(|| verify_failed(format!("stored bytes are not {}", image.format)))?;
        let decoded = self
            .decoder
            .decode(bytes, format)
            .map_err(|e| verify_failed(e.to_string()))?;

        Ok(StoredArtifact {
            variant: image.variant.clone(),
            path: path.to_string(),
            format,
            width: decoded.width,
            height: decoded.height,
            byte_size: bytes.len() as u64,
            content_hash: Hasher::content_hash_from_bytes(bytes),
        })
    }

    /// Best-effort removal of partially written artifacts.
    fn rollback(&self, paths: &[String]) {
        for path in paths.iter().rev() {
            if let Err(e) = self.store.remove(path) {
                tracing::warn!(path = %path, "Rollback could not remove artifact: {}", e);
            }
        }
    }

    /// Remove an artifact set. Missing files count as removed.
    ///
    /// Every removal is attempted; the first failure is returned afterwards.
    pub fn remove(&self, artifacts: &[StoredArtifact]) -> Result<(), StorageError> {
        let mut first_error = None;
        for artifact in artifacts {
            match self.store.remove(&artifact.path) {
                Ok(true) => tracing::debug!(path = %artifact.path, "Removed artifact"),
                Ok(false) => tracing::debug!(path = %artifact.path, "Artifact already absent"),
                Err(e) => {
                    tracing::warn!(path = %artifact.path, "Failed to remove artifact: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
