//! The `shutter remove` command: delete stored artifacts.
//!
//! This is the cleanup a caller runs after deleting a photo row. Paths are
//! the `path` fields printed by `shutter ingest`.

use clap::Args;
use shutter_core::{ArtifactStore, Config, FsStore};

/// Arguments for the `remove` command.
#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Artifact paths relative to the storage root
    #[arg(required = true)]
    pub paths: Vec<String>,
}

/// Execute the remove command.
///
/// Attempts every path, then fails if any removal errored.
pub fn execute(args: RemoveArgs, config: &Config) -> anyhow::Result<()> {
    let store = FsStore::new(config.storage_root());
    let mut errors = 0usize;

    for path in &args.paths {
        match store.remove(path) {
            Ok(true) => println!("removed {path}"),
            Ok(false) => {
                tracing::warn!(path = %path, "Artifact not found");
                println!("missing {path}");
            }
            Err(e) => {
                tracing::error!(path = %path, code = e.code(), "Remove failed: {e}");
                errors += 1;
            }
        }
    }

    if errors > 0 {
        anyhow::bail!("{errors} of {} removals failed", args.paths.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(root: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.storage.root = root.to_path_buf();
        config
    }

    #[test]
    fn test_remove_existing_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        store.put("42/2026/10/a-original.jpg", b"data").unwrap();

        let args = RemoveArgs {
            paths: vec![
                "42/2026/10/a-original.jpg".to_string(),
                "42/2026/10/gone.jpg".to_string(),
            ],
        };
        execute(args, &config(dir.path())).unwrap();
        assert!(!store.exists("42/2026/10/a-original.jpg").unwrap());
    }

    #[test]
    fn test_traversal_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let args = RemoveArgs {
            paths: vec!["../outside.jpg".to_string()],
        };
        assert!(execute(args, &config(dir.path())).is_err());
    }
}
