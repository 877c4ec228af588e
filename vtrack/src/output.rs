//! Rendering of command results.
//!
//! Every command produces one serializable value. With `--json` it is printed
//! inside an envelope carrying `success` and `result_code`; otherwise the
//! command supplies its own plain-text rendering.

use anyhow::Result;
use serde::Serialize;
use std::io::{self, Write};
use vtrack_core::{
    Hash, LabelEntry, LabelStatus, RestoreReport, UndoReport, UpdateReport, VersionRecord,
};

/// JSON wrapper shared by every command's output.
#[derive(Debug, Serialize)]
struct Envelope<'a, T: Serialize> {
    success: bool,
    result_code: u8,
    #[serde(flatten)]
    body: &'a T,
}

/// Prints command results to stdout and failures to stderr.
pub struct OutputWriter {
    json: bool,
}

impl OutputWriter {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Print a successful result. `render` runs only in text mode.
    pub fn write<T: Serialize>(&self, body: &T, render: impl FnOnce() -> String) -> Result<()> {
        let mut stdout = io::stdout().lock();
        if self.json {
            let envelope = Envelope {
                success: true,
                result_code: 0,
                body,
            };
            serde_json::to_writer_pretty(&mut stdout, &envelope)?;
            writeln!(stdout)?;
        } else {
            stdout.write_all(render().as_bytes())?;
        }
        stdout.flush()?;
        Ok(())
    }

    /// Report a failure on stderr. Write errors here are ignored: there is
    /// nowhere left to report them.
    pub fn write_error(&self, error: &anyhow::Error, result_code: u8) {
        let mut stderr = io::stderr().lock();
        if self.json {
            let body = ErrorOutput {
                error: format!("{:#}", error),
            };
            let envelope = Envelope {
                success: false,
                result_code,
                body: &body,
            };
            if let Ok(json) = serde_json::to_string_pretty(&envelope) {
                let _ = writeln!(stderr, "{}", json);
            }
        } else {
            let _ = writeln!(stderr, "Error: {:#}", error);
        }
    }
}

/// Lay rows out in space-padded columns under a header line.
pub fn columns(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let render = |cells: Vec<&str>| {
        let last = cells.len().saturating_sub(1);
        let mut line = String::new();
        for (i, cell) in cells.into_iter().enumerate() {
            if i == last {
                line.push_str(cell);
            } else {
                line.push_str(&format!("{:<width$}  ", cell, width = widths[i]));
            }
        }
        line.push('\n');
        line
    };

    let mut out = render(header.to_vec());
    for row in rows {
        out.push_str(&render(row.iter().map(String::as_str).collect()));
    }
    out
}

/// Table row for a version record, in `versions-table` column order.
pub fn record_row(record: &VersionRecord) -> Vec<String> {
    let line = record.to_line();
    line.split_whitespace().map(str::to_string).collect()
}

// Command bodies. Field names are the JSON keys.

#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub error: String,
}

/// `init`
#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub root: String,
    pub algorithm: String,
    pub tag: String,
}

/// `track`
#[derive(Debug, Serialize)]
pub struct TrackOutput {
    pub label: String,
    pub template: String,
    pub record: VersionRecord,
}

/// `update`
#[derive(Debug, Serialize)]
pub struct UpdateOutput {
    pub committed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<UpdateReport>,
}

/// `restore`
#[derive(Debug, Serialize)]
pub struct RestoreOutput {
    #[serde(flatten)]
    pub report: RestoreReport,
}

/// `undo`
#[derive(Debug, Serialize)]
pub struct UndoOutput {
    #[serde(flatten)]
    pub report: UndoReport,
}

/// `hist`
#[derive(Debug, Serialize)]
pub struct HistOutput {
    pub versions: Vec<VersionRecord>,
}

/// `labels`
#[derive(Debug, Serialize)]
pub struct LabelsOutput {
    pub labels: Vec<LabelEntry>,
}

/// `status`
#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub labels: Vec<LabelStatus>,
}

/// One unreferenced archive blob.
#[derive(Debug, Clone, Serialize)]
pub struct OrphanInfo {
    pub hash: Hash,
    pub size_on_disk: u64,
}

/// `orphans`
#[derive(Debug, Serialize)]
pub struct OrphansOutput {
    pub orphans: Vec<OrphanInfo>,
}
