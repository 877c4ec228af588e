mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use output::{
    HistOutput, InitOutput, LabelsOutput, OrphanInfo, OrphansOutput, OutputWriter, RestoreOutput,
    StatusOutput, TrackOutput, UndoOutput, UpdateOutput, columns, record_row,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vtrack_core::{
    DEFAULT_TAG, ErrorKind, Hash, Reinstated, RepoConfig, Repository, Supersede, UndoReport,
    UpdateOutcome, UpdatePlan, WorkingState,
};

/// vtrack - a local version tracker for document revisions
#[derive(Parser)]
#[command(name = "vtrack")]
#[command(about = "Track successive revisions of documents under a label", long_about = None)]
#[command(version)]
struct Cli {
    /// Working directory of the repository (defaults to VTRACK_DIR env var or the current directory)
    #[arg(short = 'C', long, global = true)]
    dir: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new repository
    Init {
        /// Initials or tag embedded in working-file names
        #[arg(long, default_value = DEFAULT_TAG)]
        tag: String,
    },

    /// Start tracking a label
    Track {
        /// Label name
        label: String,

        /// Filename template for the label's working files
        template: String,
    },

    /// Commit a file as the next version of a label
    Update {
        /// Label name
        label: String,

        /// File holding the new contents (it is moved into the working directory)
        file: PathBuf,

        /// Author email (prompted for if omitted)
        #[arg(long)]
        author: Option<String>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Restore archived content as restored_<original name>
    Restore {
        /// Digest of the version to restore
        digest: String,
    },

    /// Undo the most recent track or update
    Undo,

    /// Show the version history
    Hist,

    /// List labels and their filename templates
    Labels,

    /// Show each label's current version and working-file state
    Status,

    /// List archive entries no version refers to
    Orphans,

    /// Output archived content to stdout
    Cat {
        /// Digest of the version
        digest: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    // Determine working directory: CLI arg > VTRACK_DIR env var > current directory
    let dir = cli
        .dir
        .or_else(|| std::env::var("VTRACK_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));

    let out = OutputWriter::new(cli.json);

    let result = match cli.command {
        Commands::Init { tag } => cmd_init(&out, &dir, &tag),
        Commands::Track { label, template } => cmd_track(&out, &dir, &label, &template),
        Commands::Update {
            label,
            file,
            author,
            yes,
        } => cmd_update(&out, &dir, &label, &file, author, yes),
        Commands::Restore { digest } => cmd_restore(&out, &dir, &digest),
        Commands::Undo => cmd_undo(&out, &dir),
        Commands::Hist => cmd_hist(&out, &dir),
        Commands::Labels => cmd_labels(&out, &dir),
        Commands::Status => cmd_status(&out, &dir),
        Commands::Orphans => cmd_orphans(&out, &dir),
        Commands::Cat { digest } => cmd_cat(&dir, &digest),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = result_code(&err);
            out.write_error(&err, code);
            ExitCode::from(code)
        }
    }
}

/// Log to stderr, filtered by RUST_LOG (warnings and above by default).
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Map an error onto the process exit code.
fn result_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<vtrack_core::Error>().map(|e| e.kind()) {
        Some(ErrorKind::NotFound) => 2,
        Some(ErrorKind::AlreadyExists) => 3,
        Some(ErrorKind::DuplicateContent) => 4,
        Some(ErrorKind::IoFailure) => 5,
        Some(ErrorKind::Invalid) => 6,
        None => 1,
    }
}

fn open_repo(dir: &Path) -> Result<Repository> {
    tracing::debug!(dir = %dir.display(), "opening repository");
    Repository::open(dir).with_context(|| format!("No repository in {}", dir.display()))
}

fn parse_digest(digest: &str) -> Result<Hash> {
    Hash::from_hex(digest).with_context(|| format!("Invalid digest: {}", digest))
}

fn cmd_init(out: &OutputWriter, dir: &Path, tag: &str) -> Result<()> {
    let config = RepoConfig::new(tag)?;
    let repo = Repository::init(dir, config)
        .with_context(|| format!("Failed to initialize repository in {}", dir.display()))?;

    let data = InitOutput {
        root: repo.data_dir().display().to_string(),
        algorithm: repo.config().algorithm.as_str().to_string(),
        tag: repo.config().tag.clone(),
    };
    out.write(&data, || {
        format!(
            "Initialized repository in {}\nAlgorithm: {}\nTag: {}\n",
            data.root, data.algorithm, data.tag
        )
    })
}

fn cmd_track(out: &OutputWriter, dir: &Path, label: &str, template: &str) -> Result<()> {
    let repo = open_repo(dir)?;
    let record = repo
        .track(label, template)
        .with_context(|| format!("Failed to track label: {}", label))?;

    let data = TrackOutput {
        label: label.to_string(),
        template: template.to_string(),
        record,
    };
    out.write(&data, || format!("Label added: {} -> {}\n", label, template))
}

fn cmd_update(
    out: &OutputWriter,
    dir: &Path,
    label: &str,
    file: &Path,
    author: Option<String>,
    yes: bool,
) -> Result<()> {
    let repo = open_repo(dir)?;

    let author = match author {
        Some(author) => author,
        None => {
            check_before_prompt(&repo, label, file)
                .with_context(|| format!("Failed to update {} with {}", label, file.display()))?;
            prompt("Author email: ")?
        }
    };
    if !yes {
        ensure_interactive()?;
    }

    let outcome = repo
        .update(label, file, &author, |plan| yes || confirm(plan))
        .with_context(|| format!("Failed to update {} with {}", label, file.display()))?;

    let report = match outcome {
        UpdateOutcome::Committed(report) => Some(report),
        UpdateOutcome::Declined => None,
    };

    let data = UpdateOutput {
        committed: report.is_some(),
        report,
    };
    out.write(&data, || {
        let Some(report) = &data.report else {
            return "Abort.\n".to_string();
        };
        let mut text = format!(
            "Rename file: {} --> {}\n",
            file.display(),
            report.working_file.display()
        );
        match &report.previous {
            Supersede::Initial => {}
            Supersede::Removed { path } => {
                text.push_str(&format!("Removed previous version: {}\n", path.display()));
            }
            Supersede::Drifted { path, .. } => {
                text.push_str(&format!(
                    "Kept previous version {}: it differs from the archived copy\n",
                    path.display()
                ));
            }
            Supersede::Missing { path } => {
                text.push_str(&format!(
                    "Previous version {} was already gone\n",
                    path.display()
                ));
            }
            Supersede::Unchecked { path, reason } => {
                text.push_str(&format!(
                    "Kept previous version {}: could not check it ({})\n",
                    path.display(),
                    reason
                ));
            }
        }
        if let Some(digest) = report.record.digest() {
            text.push_str(&format!(
                "Version {} of {}: {}\n",
                report.record.version, label, digest
            ));
        }
        text
    })
}

fn cmd_restore(out: &OutputWriter, dir: &Path, digest: &str) -> Result<()> {
    let repo = open_repo(dir)?;
    let hash = parse_digest(digest)?;

    let report = repo
        .restore(&hash)
        .with_context(|| format!("Failed to restore {}", hash))?;

    let data = RestoreOutput { report };
    out.write(&data, || {
        format!("File restored: {}\n", data.report.path.display())
    })
}

fn cmd_undo(out: &OutputWriter, dir: &Path) -> Result<()> {
    let repo = open_repo(dir)?;
    let report = repo.undo().context("Failed to undo")?;

    let data = UndoOutput { report };
    out.write(&data, || match &data.report {
        UndoReport::Track { label } => format!("Stopped tracking label: {}\n", label),
        UndoReport::Update {
            record,
            reverted_to,
            from_archive,
            previous,
        } => {
            let mut text = format!(
                "Undid version {} of {}\n{}: {}\n",
                record.version,
                record.label,
                if *from_archive {
                    "Recovered from archive"
                } else {
                    "Renamed back"
                },
                reverted_to.display()
            );
            match previous {
                Reinstated::Initial => {}
                Reinstated::Extracted { path } => {
                    text.push_str(&format!("Restore previous version: {}\n", path.display()));
                }
                Reinstated::Kept { path } => {
                    text.push_str(&format!("Previous version left as is: {}\n", path.display()));
                }
            }
            text
        }
    })
}

fn cmd_hist(out: &OutputWriter, dir: &Path) -> Result<()> {
    let repo = open_repo(dir)?;
    let versions = repo.history().context("Failed to read version history")?;

    let data = HistOutput { versions };
    out.write(&data, || {
        let rows: Vec<Vec<String>> = data.versions.iter().map(record_row).collect();
        columns(
            &[
                "DATE", "TIME", "LABEL", "VERSION", "ORIGFILE", "FILE", "AUTHOR", "DIGEST",
            ],
            &rows,
        )
    })
}

fn cmd_labels(out: &OutputWriter, dir: &Path) -> Result<()> {
    let repo = open_repo(dir)?;
    let labels = repo.labels().context("Failed to read labels")?;

    let data = LabelsOutput { labels };
    out.write(&data, || {
        let rows: Vec<Vec<String>> = data
            .labels
            .iter()
            .map(|e| vec![e.label.clone(), e.template.clone()])
            .collect();
        columns(&["LABEL", "TEMPLATE"], &rows)
    })
}

fn cmd_status(out: &OutputWriter, dir: &Path) -> Result<()> {
    let repo = open_repo(dir)?;
    let labels = repo.status().context("Failed to compute status")?;

    let data = StatusOutput { labels };
    out.write(&data, || {
        let rows: Vec<Vec<String>> = data
            .labels
            .iter()
            .map(|s| {
                let (version, file) = match &s.current {
                    Some(record) => (
                        record.version.to_string(),
                        record
                            .revision
                            .as_ref()
                            .map_or_else(|| "-".to_string(), |r| r.stored.clone()),
                    ),
                    None => ("-".to_string(), "-".to_string()),
                };
                let state = match &s.working {
                    WorkingState::Initial => "no versions",
                    WorkingState::Clean => "clean",
                    WorkingState::Drifted { .. } => "modified",
                    WorkingState::Missing => "missing",
                };
                vec![s.label.clone(), version, file, state.to_string()]
            })
            .collect();
        columns(&["LABEL", "VERSION", "FILE", "STATE"], &rows)
    })
}

fn cmd_orphans(out: &OutputWriter, dir: &Path) -> Result<()> {
    let repo = open_repo(dir)?;
    let hashes = repo.orphans().context("Failed to scan archive")?;

    let mut orphans = Vec::with_capacity(hashes.len());
    for hash in hashes {
        let size_on_disk = std::fs::metadata(repo.archive().blob_path(&hash))
            .map(|m| m.len())
            .unwrap_or(0);
        orphans.push(OrphanInfo { hash, size_on_disk });
    }

    let data = OrphansOutput { orphans };
    out.write(&data, || {
        if data.orphans.is_empty() {
            return "No orphaned archive entries\n".to_string();
        }
        data.orphans
            .iter()
            .map(|o| format!("{} {} bytes\n", o.hash, o.size_on_disk))
            .collect()
    })
}

fn cmd_cat(dir: &Path, digest: &str) -> Result<()> {
    let repo = open_repo(dir)?;
    let hash = parse_digest(digest)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    repo.cat(&hash, &mut handle)
        .with_context(|| format!("Failed to output {}", hash))?;

    Ok(())
}

/// Fail on an unknown label or already-archived content before asking for an
/// author. The engine repeats both checks; unreadable input is left to it.
fn check_before_prompt(repo: &Repository, label: &str, file: &Path) -> vtrack_core::Result<()> {
    if repo.label_registry().lookup(label)?.is_none() {
        return Err(vtrack_core::Error::label_not_found(label));
    }
    if let Ok(digest) = Hash::hash_file(file)
        && repo.archive().exists(&digest)
    {
        return Err(vtrack_core::Error::duplicate_content(digest.to_hex()));
    }
    Ok(())
}

/// Refuse to block on a prompt when nobody is at the keyboard.
fn ensure_interactive() -> Result<()> {
    if !atty::is(atty::Stream::Stdin) {
        anyhow::bail!("stdin is not a terminal; pass --author and --yes to run unattended");
    }
    Ok(())
}

/// Ask a question on stderr and read one trimmed line from stdin.
fn prompt(question: &str) -> Result<String> {
    ensure_interactive()?;

    let mut stderr = io::stderr();
    write!(stderr, "{}", question)?;
    stderr.flush()?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read from stdin")?;
    Ok(answer.trim().to_string())
}

/// Show the update plan and ask for a yes/no answer.
fn confirm(plan: &UpdatePlan) -> bool {
    eprintln!();
    eprintln!("Label  : {}", plan.label);
    eprintln!("File   : {}", plan.input.display());
    eprintln!("Author : {}", plan.author);
    eprintln!("Version: {} ({})", plan.version, plan.stored);

    match prompt("Confirm update? (y/n): ") {
        Ok(answer) => is_yes(&answer),
        Err(_) => false,
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y"));
        assert!(is_yes("YES"));
        assert!(!is_yes("n"));
        assert!(!is_yes(""));
        assert!(!is_yes("yep"));
    }

    #[test]
    fn test_result_code_from_core_error() {
        let err = anyhow::Error::new(vtrack_core::Error::label_not_found("x")).context("wrapped");
        assert_eq!(result_code(&err), 2);

        let err = anyhow::Error::new(vtrack_core::Error::duplicate_content("ab"));
        assert_eq!(result_code(&err), 4);

        let err = anyhow::anyhow!("plain failure");
        assert_eq!(result_code(&err), 1);
    }

    #[test]
    fn test_cli_parses_update() {
        let cli = Cli::try_parse_from([
            "vtrack", "--json", "-C", "/tmp/w", "update", "report", "draft.docx", "--author",
            "a@x.com", "-y",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.dir, Some(PathBuf::from("/tmp/w")));
        match cli.command {
            Commands::Update {
                label,
                file,
                author,
                yes,
            } => {
                assert_eq!(label, "report");
                assert_eq!(file, PathBuf::from("draft.docx"));
                assert_eq!(author.as_deref(), Some("a@x.com"));
                assert!(yes);
            }
            _ => panic!("expected update"),
        }
    }

    #[test]
    fn test_check_before_prompt() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let inbox = tempfile::TempDir::new().unwrap();
        let repo = Repository::init(temp_dir.path(), RepoConfig::new("XX").unwrap()).unwrap();
        repo.track("report", "quarterly").unwrap();

        let draft = inbox.path().join("draft.txt");
        std::fs::write(&draft, b"v1").unwrap();

        let err = check_before_prompt(&repo, "ghost", &draft).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(check_before_prompt(&repo, "report", &draft).is_ok());

        repo.update("report", &draft, "a@x.com", |_| true).unwrap();
        let copy = inbox.path().join("copy.txt");
        std::fs::write(&copy, b"v1").unwrap();
        let err = check_before_prompt(&repo, "report", &copy).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateContent);

        // Unreadable input is reported by the update itself
        let gone = inbox.path().join("gone.txt");
        assert!(check_before_prompt(&repo, "report", &gone).is_ok());
    }

    #[test]
    fn test_cli_verify() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
