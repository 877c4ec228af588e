//! Label registry: which labels exist and their filename templates.

use crate::error::{Error, Result};
use crate::table::Table;
use serde::Serialize;
use std::path::Path;

/// A registered label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelEntry {
    /// Logical document identity.
    pub label: String,
    /// Prefix used to name the label's working files.
    pub template: String,
}

impl LabelEntry {
    /// Create a new label entry.
    pub fn new(label: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            template: template.into(),
        }
    }

    /// Serialize the entry as `LABEL TEMPLATE`.
    pub fn to_line(&self) -> String {
        format!("{} {}", self.label, self.template)
    }

    /// Parse an entry from a `LABEL TEMPLATE` line.
    pub fn from_line(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [label, template] => Ok(Self::new(*label, *template)),
            _ => Err(Error::corrupted_table(
                "labels-table",
                format!("expected 2 fields, got {}: {:?}", fields.len(), line),
            )),
        }
    }
}

/// The append-only label registry.
#[derive(Debug)]
pub struct LabelRegistry {
    table: Table,
}

impl LabelRegistry {
    /// Open or create the registry at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            table: Table::open(path)?,
        })
    }

    /// Every entry, in the order they were registered.
    pub fn all(&self) -> Result<Vec<LabelEntry>> {
        self.table
            .lines()?
            .iter()
            .map(|line| LabelEntry::from_line(line))
            .collect()
    }

    /// Find the filename template of `label`.
    pub fn lookup(&self, label: &str) -> Result<Option<String>> {
        Ok(self
            .all()?
            .into_iter()
            .find(|entry| entry.label == label)
            .map(|entry| entry.template))
    }

    /// Register a new label.
    pub fn create(&self, label: &str, template: &str) -> Result<LabelEntry> {
        if self.lookup(label)?.is_some() {
            return Err(Error::label_exists(label));
        }

        let entry = LabelEntry::new(label, template);
        self.table.append(&entry.to_line())?;
        Ok(entry)
    }

    /// The most recently registered entry.
    pub fn last(&self) -> Result<Option<LabelEntry>> {
        self.table
            .lines()?
            .last()
            .map(|line| LabelEntry::from_line(line))
            .transpose()
    }

    /// Remove the most recently registered entry, whichever label it names.
    pub fn remove_last(&self) -> Result<Option<LabelEntry>> {
        self.table
            .remove_last()?
            .map(|line| LabelEntry::from_line(&line))
            .transpose()
    }
}
