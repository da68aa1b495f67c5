//! Image ingestion pipeline components.
//!
//! This module contains all the stages of the ingestion pipeline:
//! - **decode**: Sniff formats and decode under resource limits
//! - **validate**: Reject unacceptable uploads before any processing
//! - **metadata**: Read EXIF orientation, detect script payloads, strip metadata
//! - **normalize**: Apply orientation and sanitize the stored original
//! - **derive**: Generate resized, recompressed variants
//! - **hash**: Content hashes and upload keys
//! - **pool**: Bounded worker pool, timeouts, and cancellation
//! - **discovery**: Find image files in directories
//! - **processor**: Orchestrates the full pipeline

pub mod decode;
pub mod derive;
pub mod discovery;
pub mod hash;
pub mod metadata;
pub mod normalize;
pub mod pool;
pub mod processor;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenient access
pub use decode::{DecodedImage, ImageDecoder};
pub use derive::DerivativeGenerator;
pub use discovery::{DiscoveredFile, FileDiscovery};
pub use hash::Hasher;
pub use metadata::{MetadataInspector, Orientation};
pub use normalize::{NormalizedImage, Normalizer};
pub use pool::{CancelToken, WorkerPool};
pub use processor::{IngestPipeline, PipelineStage, StoredUpload};
pub use validate::Validator;
