//! Append-only, line-oriented text tables.
//!
//! Both the label registry and the version log are stored this way: one
//! entry per line, appended at the end, and only ever shortened by dropping
//! the final line.

use crate::error::Result;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A line table on disk.
#[derive(Debug)]
pub(crate) struct Table {
    path: PathBuf,
}

impl Table {
    /// Open or create a table at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            File::create(&path)?;
        }

        Ok(Self { path })
    }

    /// Short name used in error messages.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Append one line.
    pub fn append(&self, line: &str) -> Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file, "{}", line)?;
        file.flush()?;
        Ok(())
    }

    /// Read every non-blank line, in order.
    pub fn lines(&self) -> Result<Vec<String>> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);

        let mut lines = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            lines.push(line);
        }
        Ok(lines)
    }

    /// Drop the last line and return it, or `None` if the table is empty.
    ///
    /// The table is rewritten through a temp file and renamed into place.
    pub fn remove_last(&self) -> Result<Option<String>> {
        let mut lines = self.lines()?;
        let Some(last) = lines.pop() else {
            return Ok(None);
        };

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp_file = tempfile::NamedTempFile::new_in(dir)?;
        for line in &lines {
            writeln!(temp_file, "{}", line)?;
        }
        temp_file.flush()?;
        temp_file.persist(&self.path)?;

        debug!(table = %self.name(), remaining = lines.len(), "removed last line");
        Ok(Some(last))
    }

    #[cfg(test)]
    pub fn raw(&self) -> String {
        std::fs::read_to_string(&self.path).unwrap_or_default()
    }
}
