//! The `shutter check` command: run the validator only.

use clap::Args;
use serde::Serialize;
use shutter_core::{Config, ImageKind, IngestError, IngestPipeline, ValidationResult};
use std::path::{Path, PathBuf};

/// Arguments for the `check` command.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// File to validate
    pub file: PathBuf,

    /// Declared content type (default: inferred from the file extension)
    #[arg(long)]
    pub content_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum CheckReport {
    Valid {
        #[serde(flatten)]
        result: ValidationResult,
    },
    Rejected {
        code: &'static str,
        detail: String,
        message: &'static str,
    },
}

/// Execute the check command.
///
/// Prints a JSON report and fails if the file would be rejected.
pub fn execute(args: CheckArgs, config: &Config) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.file)?;
    let content_type = args
        .content_type
        .unwrap_or_else(|| declared_type(&args.file).to_string());
    let filename = args.file.file_name().and_then(|n| n.to_str());

    let pipeline = IngestPipeline::new(config);
    let report = match pipeline.check(&bytes, &content_type, filename) {
        Ok(result) => CheckReport::Valid { result },
        Err(e) => {
            let detail = e.detail.clone();
            let err = IngestError::from(e);
            CheckReport::Rejected {
                code: err.reason_code(),
                detail,
                message: err.user_message(),
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);

    if let CheckReport::Rejected { code, .. } = report {
        anyhow::bail!("{} rejected: {code}", args.file.display());
    }
    Ok(())
}

fn declared_type(path: &Path) -> &'static str {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(ImageKind::from_extension)
        .map(|kind| kind.mime_type())
        .unwrap_or("application/octet-stream")
}
