use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Durable set of document identifiers already ingested. Newline-delimited
/// plain text, append-only, the sole authority for "already seen".
///
/// Single-writer: at most one fetch call appends at a time.
pub struct FetchLedger {
    path: PathBuf,
    ids: HashSet<String>,
}

impl FetchLedger {
    /// Open the ledger, loading existing identifiers if the file exists.
    pub fn open(path: &Path) -> Result<Self> {
        let mut ids = HashSet::new();
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            ids.extend(
                contents
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string),
            );
        }
        Ok(Self {
            path: path.to_path_buf(),
            ids,
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Append identifiers in one pass, after a fetch batch has fully
    /// succeeded. Duplicates already present are not rewritten.
    pub fn append_all<I, S>(&mut self, ids: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        for id in ids {
            let id = id.as_ref();
            if self.ids.insert(id.to_string()) {
                writeln!(file, "{id}")?;
            }
        }
        Ok(())
    }
}
