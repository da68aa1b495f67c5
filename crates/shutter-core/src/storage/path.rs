//! Storage path derivation and path safety checks.
//!
//! Layout: `{YYYY}/{MM}/{DD}/{owner}/{millis}-{digest}_{variant}.{ext}`.
//! Nothing the client controls beyond the owner id (sanitized) reaches a path.

use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};

use crate::error::StorageError;
use crate::pipeline::hash::Hasher;

/// Longest owner directory name.
pub const MAX_OWNER_LEN: usize = 64;

/// Longest sanitized display name.
pub const MAX_DISPLAY_NAME_LEN: usize = 255;

/// Owner directory used when an owner id sanitizes to nothing.
pub const ANONYMOUS_OWNER: &str = "anonymous";

/// Map an owner id onto `[A-Za-z0-9_-]`, at most [`MAX_OWNER_LEN`] chars.
pub fn sanitize_owner(owner_id: &str) -> String {
    let sanitized: String = owner_id
        .chars()
        .take(MAX_OWNER_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        ANONYMOUS_OWNER.to_string()
    } else {
        sanitized
    }
}

/// Clean a client filename for display. Returns `None` if nothing usable is left.
///
/// Directory components and control characters are dropped; the result is
/// never used to build a storage path.
pub fn sanitize_display_name(filename: &str) -> Option<String> {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_DISPLAY_NAME_LEN)
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').trim().to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Directory holding one owner's uploads for the day of `timestamp`.
pub fn upload_dir(owner_id: &str, timestamp: DateTime<Utc>) -> String {
    format!(
        "{}/{}",
        timestamp.format("%Y/%m/%d"),
        sanitize_owner(owner_id)
    )
}

/// Relative path of one artifact.
pub fn artifact_path(
    owner_id: &str,
    timestamp: DateTime<Utc>,
    variant: &str,
    extension: &str,
) -> String {
    format!(
        "{}/{}_{}.{}",
        upload_dir(owner_id, timestamp),
        Hasher::upload_key(owner_id, timestamp),
        variant,
        extension
    )
}

/// Normalize a relative storage path, rejecting anything that could escape
/// the storage root.
pub fn validate_path(path: &str) -> Result<PathBuf, StorageError> {
    let invalid = || StorageError::InvalidPath {
        path: path.to_string(),
    };
    if path.is_empty() {
        return Err(invalid());
    }

    let candidate = Path::new(path);
    if candidate.is_absolute() {
        return Err(invalid());
    }

    let mut normalized = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(name) => normalized.push(name),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(invalid())
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(invalid());
    }
    Ok(normalized)
}
