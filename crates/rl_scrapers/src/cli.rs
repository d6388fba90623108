use std::path::{Path, PathBuf};
use clap::Args;
use rl_core::{HistoryEntry, Result};
use crate::manager::IngestManager;

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// JSON file holding an array of {"title", "url"} objects
    pub file: PathBuf,
    /// User the articles are stored for
    #[arg(long, short)]
    pub user: String,
}

pub fn read_history(path: &Path) -> Result<Vec<HistoryEntry>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Runs one ingestion job in the foreground and prints the stored article ids.
pub async fn handle_command(args: IngestArgs, manager: &IngestManager) -> Result<Vec<String>> {
    let entries = read_history(&args.file)?;
    println!("Read {} history entries from {}", entries.len(), args.file.display());

    let (job_id, handle) = manager.submit(&args.user, entries).await?;
    let new_ids = handle
        .await
        .map_err(|e| rl_core::Error::External(e.into()))?;

    println!("Job {} complete: {} new articles", job_id, new_ids.len());
    for id in &new_ids {
        println!("  🆕 {}", id);
    }
    Ok(new_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_history() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"title": "Rust", "url": "https://example.dev/rust"}}, {{"url": "https://example.dev/no-title"}}, {{"title": null, "url": "https://example.dev/null-title"}}, {{"title": "Gone", "url": null}}]"#
        )
        .unwrap();

        let entries = read_history(file.path()).unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0], HistoryEntry::new("Rust", "https://example.dev/rust"));
        assert_eq!(entries[1].title, "");
        assert_eq!(entries[2], HistoryEntry::new("", "https://example.dev/null-title"));
        assert_eq!(entries[3], HistoryEntry::new("Gone", ""));
    }

    #[test]
    fn test_read_history_rejects_objects() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"title": "Rust"}}"#).unwrap();
        assert!(matches!(read_history(file.path()), Err(rl_core::Error::Serialization(_))));
    }
}
