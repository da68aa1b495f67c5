//! Durable storage of upload artifacts.
//!
//! - **path**: deterministic path scheme and path safety checks
//! - **fs**: the `ArtifactStore` trait and its filesystem backend
//! - **writer**: verified, all-or-nothing writes of an artifact set

pub mod fs;
pub mod path;
pub mod writer;

pub use fs::{ArtifactStore, FsStore};
pub use path::{artifact_path, sanitize_display_name, sanitize_owner};
pub use writer::StorageWriter;
