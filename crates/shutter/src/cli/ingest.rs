//! The `shutter ingest` command.

use clap::Args;
use futures_util::{stream, StreamExt};
use serde::Serialize;
use shutter_core::pipeline::FileDiscovery;
use shutter_core::{
    Config, ImageKind, IngestError, IngestPipeline, PipelineStage, UploadRecord, UploadRequest,
    Visibility,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::output::{OutputFormat, OutputWriter};

/// Content type sent when neither `--content-type` nor the extension says otherwise.
const UNKNOWN_CONTENT_TYPE: &str = "application/octet-stream";

/// Arguments for the `ingest` command.
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Image file or directory to ingest
    pub input: PathBuf,

    /// Owner identifier the artifacts are stored under
    #[arg(long)]
    pub owner: String,

    /// Declared content type (default: inferred from the file extension)
    #[arg(long)]
    pub content_type: Option<String>,

    /// Mark uploads as private
    #[arg(long)]
    pub private: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Uploads processed at once (default: pipeline.workers from config)
    #[arg(short, long)]
    pub parallel: Option<usize>,

    /// Run every stage, print the records, then remove what was stored
    #[arg(long)]
    pub dry_run: bool,
}

/// One file to submit, with what a browser would have declared for it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Submission {
    path: PathBuf,
    content_type: String,
    filename: Option<String>,
}

/// Result line for one input file.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum IngestOutcome {
    Stored {
        file: String,
        #[serde(flatten)]
        record: UploadRecord,
    },
    Rejected {
        file: String,
        code: &'static str,
        message: String,
    },
    Failed {
        file: String,
        code: &'static str,
        stage: PipelineStage,
        message: String,
    },
}

impl IngestOutcome {
    fn from_error(file: String, error: &IngestError) -> Self {
        if error.is_rejection() {
            Self::Rejected {
                file,
                code: error.reason_code(),
                message: error.user_message().to_string(),
            }
        } else {
            Self::Failed {
                file,
                code: error.reason_code(),
                stage: error.stage(),
                message: error.to_string(),
            }
        }
    }

    fn stored_bytes(&self) -> u64 {
        match self {
            Self::Stored { record, .. } => record.artifacts.iter().map(|a| a.byte_size).sum(),
            _ => 0,
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    stored: u64,
    rejected: u64,
    failed: u64,
    bytes: u64,
}

impl Tally {
    fn record(&mut self, outcome: &IngestOutcome) {
        match outcome {
            IngestOutcome::Stored { .. } => self.stored += 1,
            IngestOutcome::Rejected { .. } => self.rejected += 1,
            IngestOutcome::Failed { .. } => self.failed += 1,
        }
        self.bytes += outcome.stored_bytes();
    }
}

/// Execute the ingest command.
pub async fn execute(args: IngestArgs, mut config: Config) -> anyhow::Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Input path does not exist: {}", args.input.display());
    }

    let parallel = args.parallel.unwrap_or(config.pipeline.workers).max(1);
    config.pipeline.workers = parallel;

    let submissions = collect_submissions(&args.input, args.content_type.as_deref());
    if submissions.is_empty() {
        tracing::warn!("No JPEG, PNG, or GIF files found at {}", args.input.display());
        return Ok(());
    }
    tracing::info!(
        files = submissions.len(),
        parallel,
        root = %config.storage_root().display(),
        "Ingesting"
    );

    let pipeline = IngestPipeline::new(&config);
    let visibility = if args.private {
        Visibility::Private
    } else {
        Visibility::Public
    };

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout().lock()),
    };
    let mut writer = OutputWriter::new(sink, args.format, true);

    let single = args.input.is_file();
    let progress = (!single).then(|| create_progress_bar(submissions.len() as u64));
    let start = Instant::now();

    let mut outcomes = stream::iter(&submissions)
        .map(|submission| {
            ingest_one(&pipeline, submission, &args.owner, visibility, args.dry_run)
        })
        .buffer_unordered(parallel);

    let mut tally = Tally::default();
    let mut collected = Vec::new();
    while let Some(outcome) = outcomes.next().await {
        tally.record(&outcome);
        if let Some(pb) = &progress {
            pb.inc(1);
            pb.set_message(format!("{} stored, {} rejected", tally.stored, tally.rejected));
        }
        match args.format {
            OutputFormat::Jsonl => writer.write(&outcome)?,
            OutputFormat::Json => collected.push(outcome),
        }
    }

    if let Some(pb) = &progress {
        pb.finish_with_message("done");
    }

    match (args.format, single) {
        (OutputFormat::Json, true) => {
            if let Some(outcome) = collected.first() {
                writer.write(outcome)?;
            }
        }
        (OutputFormat::Json, false) => writer.write_all(&collected)?,
        (OutputFormat::Jsonl, _) => {}
    }
    writer.flush()?;

    if !single {
        print_summary(&tally, start.elapsed());
    }

    if tally.stored == 0 && tally.rejected + tally.failed > 0 {
        anyhow::bail!("No uploads were stored");
    }
    Ok(())
}

async fn ingest_one(
    pipeline: &IngestPipeline,
    submission: &Submission,
    owner: &str,
    visibility: Visibility,
    dry_run: bool,
) -> IngestOutcome {
    let file = submission.path.display().to_string();

    let bytes = match tokio::fs::read(&submission.path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return IngestOutcome::Failed {
                file,
                code: "read_failed",
                stage: PipelineStage::Received,
                message: e.to_string(),
            }
        }
    };

    let mut request = UploadRequest::new(bytes, submission.content_type.as_str(), owner)
        .with_visibility(visibility);
    if let Some(name) = &submission.filename {
        request = request.with_filename(name.as_str());
    }

    let stored = match pipeline.ingest(request).await {
        Ok(stored) => stored,
        Err(e) => return IngestOutcome::from_error(file, &e),
    };

    if dry_run {
        let record = stored.record().clone();
        return match stored.discard() {
            Ok(()) => IngestOutcome::Stored { file, record },
            Err(e) => IngestOutcome::from_error(file, &e),
        };
    }

    let record = stored.commit();
    tracing::debug!(file = %file, key = %record.upload_key, "Committed upload");
    IngestOutcome::Stored { file, record }
}

/// Build the submission list.
///
/// A single file is always submitted so the validator can reject it. A
/// directory yields only files with image extensions.
fn collect_submissions(input: &Path, content_type: Option<&str>) -> Vec<Submission> {
    if input.is_file() {
        let guessed = input
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(ImageKind::from_extension)
            .map(|kind| kind.mime_type())
            .unwrap_or(UNKNOWN_CONTENT_TYPE);
        return vec![Submission {
            path: input.to_path_buf(),
            content_type: content_type.unwrap_or(guessed).to_string(),
            filename: input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
        }];
    }

    FileDiscovery::new()
        .discover(input)
        .into_iter()
        .map(|file| Submission {
            content_type: content_type.unwrap_or(file.content_type()).to_string(),
            filename: file.file_name(),
            path: file.path,
        })
        .collect()
}

fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let style = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

    let pb = ProgressBar::new(total);
    pb.set_style(style);
    pb.set_message("starting...");
    pb
}

fn print_summary(tally: &Tally, elapsed: std::time::Duration) {
    let total = tally.stored + tally.rejected + tally.failed;
    let rate = if elapsed.as_secs_f64() > 0.0 {
        total as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Stored:       {:>8}", tally.stored);
    if tally.rejected > 0 {
        eprintln!("    Rejected:     {:>8}", tally.rejected);
    }
    if tally.failed > 0 {
        eprintln!("    Failed:       {:>8}", tally.failed);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", total);
    eprintln!("    Written:      {:>7.1} MB", tally.bytes as f64 / 1_000_000.0);
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("    Rate:         {:>7.1} img/sec", rate);
    eprintln!("  ====================================");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(input: PathBuf, root: &Path) -> (IngestArgs, Config) {
        let mut config = Config::default();
        config.storage.root = root.to_path_buf();
        let args = IngestArgs {
            input,
            owner: "42".to_string(),
            content_type: None,
            private: false,
            format: OutputFormat::Jsonl,
            output: Some(root.join("out.jsonl")),
            parallel: Some(2),
            dry_run: false,
        };
        (args, config)
    }

    #[test]
    fn test_single_file_submitted_regardless_of_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("setup.exe");
        std::fs::write(&path, b"MZ").unwrap();

        let subs = collect_submissions(&path, None);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].content_type, UNKNOWN_CONTENT_TYPE);
        assert_eq!(subs[0].filename.as_deref(), Some("setup.exe"));
    }

    #[test]
    fn test_content_type_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"x").unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let subs = collect_submissions(dir.path(), None);
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].content_type, "image/png");
        assert_eq!(subs[1].content_type, "image/jpeg");

        let forced = collect_submissions(dir.path(), Some("image/gif"));
        assert!(forced.iter().all(|s| s.content_type == "image/gif"));
    }

    #[test]
    fn test_outcome_serialization() {
        let err = IngestError::from(shutter_core::ValidationError::new(
            shutter_core::ValidationErrorKind::TooLarge,
            "12 MB",
        ));
        let outcome = IngestOutcome::from_error("big.png".to_string(), &err);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["code"], "too_large");
        assert_eq!(json["file"], "big.png");

        let stored = IngestOutcome::Stored {
            file: "a.jpg".to_string(),
            record: UploadRecord {
                upload_key: "1-abc".to_string(),
                owner_id: "42".to_string(),
                ..UploadRecord::default()
            },
        };
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["status"], "stored");
        assert_eq!(json["upload_key"], "1-abc");
    }

    #[tokio::test]
    async fn test_directory_of_invalid_files_is_rejected_without_writes() {
        let input = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        std::fs::write(input.path().join("a.jpg"), b"not really a jpeg").unwrap();
        std::fs::write(input.path().join("b.png"), vec![0u8; 512]).unwrap();

        let (args, config) = args(input.path().to_path_buf(), root.path());
        let out = args.output.clone().unwrap();
        assert!(execute(args, config).await.is_err());

        let text = std::fs::read_to_string(out).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l["status"] == "rejected"));

        let entries: Vec<_> = std::fs::read_dir(root.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "out.jsonl")
            .collect();
        assert!(entries.is_empty());
    }
}
