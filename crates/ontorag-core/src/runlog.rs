//! Incremental-run log: file names of documents already ingested.

use crate::error::Result;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct RunLog {
    path: Option<PathBuf>,
    done: BTreeSet<String>,
}

impl RunLog {
    /// Load the log at `path`; a missing file is an empty log.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let done = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            serde_json::from_str::<Vec<String>>(&text)?.into_iter().collect()
        } else {
            BTreeSet::new()
        };
        Ok(Self {
            path: Some(path),
            done,
        })
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.done.contains(file_name)
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.done.iter().map(|s| s.as_str())
    }

    /// Record a finished document and rewrite the log. The name is only
    /// recorded in memory once the rewrite succeeded.
    pub fn mark_done(&mut self, file_name: &str) -> Result<()> {
        if self.done.contains(file_name) {
            return Ok(());
        }
        let mut next = self.done.clone();
        next.insert(file_name.to_string());
        self.save(&next)?;
        self.done = next;
        Ok(())
    }

    fn save(&self, done: &BTreeSet<String>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let entries: Vec<&String> = done.iter().collect();
        let json = serde_json::to_vec_pretty(&entries)?;
        write_atomic(path, &json)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    let mut file = std::fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persists_sorted_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("processed.json");
        let mut log = RunLog::open(&path).unwrap();
        assert!(log.is_empty());
        log.mark_done("b.pdf").unwrap();
        log.mark_done("a.pdf").unwrap();
        log.mark_done("b.pdf").unwrap();

        let raw: Vec<String> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, vec!["a.pdf", "b.pdf"]);

        let reopened = RunLog::open(&path).unwrap();
        assert!(reopened.contains("a.pdf"));
        assert_eq!(reopened.len(), 2);
    }

    #[test]
    fn failed_save_does_not_record_the_name() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();
        let mut log = RunLog::open(blocker.join("processed.json")).unwrap();

        assert!(log.mark_done("a.pdf").is_err());
        assert!(!log.contains("a.pdf"));
        assert!(log.is_empty());
        // Still not recorded, so the retry writes again and fails again.
        assert!(log.mark_done("a.pdf").is_err());
    }

    #[test]
    fn corrupt_log_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(RunLog::open(&path), Err(crate::Error::Json(_))));
    }
}
