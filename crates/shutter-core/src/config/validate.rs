//! Configuration validation with range checks.

use std::collections::HashSet;

use crate::error::ConfigError;
use crate::types::ORIGINAL_VARIANT;

use super::{Config, MAX_DECODE_ALLOC_MB_LIMIT, MAX_FILE_SIZE_MB_LIMIT};

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.workers == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.workers must be > 0".into(),
            ));
        }
        if !(1..=MAX_FILE_SIZE_MB_LIMIT).contains(&self.limits.max_file_size_mb) {
            return Err(ConfigError::ValidationError(format!(
                "limits.max_file_size_mb must be between 1 and {MAX_FILE_SIZE_MB_LIMIT}"
            )));
        }
        if self.limits.min_file_size_bytes >= self.limits.max_file_size_bytes() {
            return Err(ConfigError::ValidationError(
                "limits.min_file_size_bytes must be below limits.max_file_size_mb".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.min_image_dimension == 0
            || self.limits.min_image_dimension > self.limits.max_image_dimension
        {
            return Err(ConfigError::ValidationError(
                "limits.min_image_dimension must be between 1 and limits.max_image_dimension"
                    .into(),
            ));
        }
        if !(1..=MAX_DECODE_ALLOC_MB_LIMIT).contains(&self.limits.max_decode_alloc_mb) {
            return Err(ConfigError::ValidationError(format!(
                "limits.max_decode_alloc_mb must be between 1 and {MAX_DECODE_ALLOC_MB_LIMIT}"
            )));
        }
        if self.limits.process_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.process_timeout_ms must be > 0".into(),
            ));
        }
        if !(1..=100).contains(&self.storage.original_quality) {
            return Err(ConfigError::ValidationError(
                "storage.original_quality must be between 1 and 100".into(),
            ));
        }
        self.validate_derivatives()
    }

    fn validate_derivatives(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for spec in &self.derivatives {
            let name = &spec.name;
            if name.is_empty()
                || name.len() > 32
                || !name
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
            {
                return Err(ConfigError::ValidationError(format!(
                    "derivatives: invalid name '{name}' (use 1-32 chars of a-z, 0-9, '_' or '-')"
                )));
            }
            if name == ORIGINAL_VARIANT {
                return Err(ConfigError::ValidationError(format!(
                    "derivatives: '{ORIGINAL_VARIANT}' is reserved"
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "derivatives: duplicate name '{name}'"
                )));
            }
            if spec.max_edge == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "derivatives.{name}.max_edge must be > 0"
                )));
            }
            if !(1..=100).contains(&spec.quality) {
                return Err(ConfigError::ValidationError(format!(
                    "derivatives.{name}.quality must be between 1 and 100"
                )));
            }
            if spec.max_bytes == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "derivatives.{name}.max_bytes must be > 0"
                )));
            }
        }
        Ok(())
    }
}
