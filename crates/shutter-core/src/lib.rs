//! Shutter Core - Embeddable photo upload ingestion library.
//!
//! Shutter takes a raw upload as received by a web application and turns it
//! into a set of verified artifacts on storage: a sanitized original plus
//! resized derivatives.
//!
//! # Architecture
//!
//! Shutter is a pure pipeline with no database dependencies. The caller owns
//! the photo rows and commits an upload once it has recorded it:
//!
//! ```text
//! Upload → Validate → Normalize → Derive → Store → (caller) Commit
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use shutter_core::{Config, IngestPipeline, UploadRequest};
//!
//! #[tokio::main]
//! async fn main() -> shutter_core::Result<()> {
//!     let config = Config::load()?;
//!     let pipeline = IngestPipeline::new(&config);
//!
//!     let bytes = std::fs::read("./photo.jpg")?;
//!     let stored = pipeline
//!         .ingest(UploadRequest::new(bytes, "image/jpeg", "42"))
//!         .await?;
//!     // ... insert the database row, then:
//!     let record = stored.commit();
//!     println!("Stored {} artifacts", record.artifacts.len());
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod clock;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod storage;
pub mod types;

// Re-exports for convenient access
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use error::{
    ConfigError, DerivativeError, IngestError, IngestResult, NormalizationError, Result,
    ShutterError, StorageError, ValidationError, ValidationErrorKind,
};
pub use pipeline::{CancelToken, IngestPipeline, PipelineStage, StoredUpload};
pub use storage::{ArtifactStore, FsStore};
pub use types::{
    DerivativeSpec, ImageKind, OutputFormat, StoredArtifact, UploadRecord, UploadRequest,
    ValidationResult, Visibility,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
