//! Journal command - Inspect a journal directory
//!
//! Opening the journal runs the same recovery as `serve` (a torn tail is
//! truncated), so point it at a stopped instance only.
//!
//! # Usage
//!
//! ```bash
//! sluice journal inspect                    # offsets and segments
//! sluice journal inspect --json             # same, as JSON
//! sluice journal read --from 100 --limit 20 # dump entries
//! sluice journal read --uncommitted         # entries not yet delivered
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use sluice_journal::CommitLogJournal;
use sluice_sinks::format_batch;

use crate::cmd::serve::load_config;

/// Entries fetched per read call while dumping
const READ_CHUNK: usize = 1024;

/// Journal command arguments
#[derive(Args, Debug)]
pub struct JournalArgs {
    #[command(subcommand)]
    command: JournalCommand,

    /// Journal directory (overrides `[journal].path` from the config)
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum JournalCommand {
    /// Show offsets, size and segments
    Inspect {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print entries, one line each
    Read {
        /// First offset to print (defaults to the first retained offset)
        #[arg(long, conflicts_with = "uncommitted")]
        from: Option<u64>,

        /// Start after the committed read offset
        #[arg(long)]
        uncommitted: bool,

        /// Maximum number of entries to print
        #[arg(long)]
        limit: Option<usize>,
    },
}

/// Run the journal command
pub fn run(args: JournalArgs, config_path: Option<&Path>) -> Result<()> {
    let mut journal_config = load_config(config_path.map(Path::to_path_buf))?.journal;
    if let Some(path) = args.path {
        journal_config.path = path;
    }

    if !journal_config.path.is_dir() {
        anyhow::bail!("journal directory not found: {}", journal_config.path.display());
    }

    let journal = CommitLogJournal::open(&journal_config)
        .with_context(|| format!("failed to open journal {}", journal_config.path.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match args.command {
        JournalCommand::Inspect { json } => {
            if json {
                inspect_json(&journal, &mut out)?;
            } else {
                inspect(&journal, &mut out)?;
            }
        }
        JournalCommand::Read {
            from,
            uncommitted,
            limit,
        } => {
            let start = if uncommitted {
                journal.committed_read_offset().map_or(0, |c| c + 1)
            } else {
                from.or(journal.first_offset()).unwrap_or(0)
            };
            read(&journal, start, limit.unwrap_or(usize::MAX), &mut out)?;
        }
    }

    journal.close().context("failed to close journal")?;
    Ok(())
}

fn inspect(journal: &CommitLogJournal, out: &mut impl Write) -> Result<()> {
    let committed = journal
        .committed_read_offset()
        .map_or_else(|| "-".to_string(), |c| c.to_string());
    let first = journal
        .first_offset()
        .map_or_else(|| "-".to_string(), |o| o.to_string());

    writeln!(out, "journal:         {}", journal.dir().display())?;
    writeln!(out, "first offset:    {first}")?;
    writeln!(out, "log end offset:  {}", journal.log_end_offset())?;
    writeln!(out, "committed:       {committed}")?;
    writeln!(out, "uncommitted:     {}", uncommitted(journal))?;
    writeln!(out, "size:            {} bytes", journal.size())?;
    writeln!(out, "segments:        {}", journal.number_of_segments())?;
    writeln!(out)?;
    writeln!(
        out,
        "{:>20}  {:>12}  {:>20}  {:>20}  {:<24}  state",
        "base", "bytes", "first", "last", "modified"
    )?;

    for segment in journal.segments() {
        let opt = |o: Option<u64>| o.map_or_else(|| "-".to_string(), |o| o.to_string());
        writeln!(
            out,
            "{:>20}  {:>12}  {:>20}  {:>20}  {:<24}  {}",
            segment.base_offset,
            segment.size_bytes,
            opt(segment.first_offset),
            opt(segment.last_offset),
            segment.last_modified.format("%Y-%m-%d %H:%M:%S").to_string(),
            if segment.active { "active" } else { "sealed" }
        )?;
    }

    Ok(())
}

fn inspect_json(journal: &CommitLogJournal, out: &mut impl Write) -> Result<()> {
    let segments: Vec<_> = journal
        .segments()
        .into_iter()
        .map(|s| {
            serde_json::json!({
                "base_offset": s.base_offset,
                "path": s.path.display().to_string(),
                "size_bytes": s.size_bytes,
                "first_offset": s.first_offset,
                "last_offset": s.last_offset,
                "created_at": s.created_at.to_rfc3339(),
                "last_modified": s.last_modified.to_rfc3339(),
                "active": s.active,
            })
        })
        .collect();

    let report = serde_json::json!({
        "path": journal.dir().display().to_string(),
        "first_offset": journal.first_offset(),
        "log_end_offset": journal.log_end_offset(),
        "committed_read_offset": journal.committed_read_offset(),
        "uncommitted": uncommitted(journal),
        "size_bytes": journal.size(),
        "segments": segments,
    });

    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}

fn uncommitted(journal: &CommitLogJournal) -> u64 {
    let start = journal
        .committed_read_offset()
        .map_or(journal.first_offset().unwrap_or(0), |c| c + 1);
    journal.log_end_offset().saturating_sub(start)
}

fn read(
    journal: &CommitLogJournal,
    mut cursor: u64,
    limit: usize,
    out: &mut impl Write,
) -> Result<usize> {
    let mut printed = 0;
    let log_end = journal.log_end_offset();

    while printed < limit && cursor < log_end {
        let batch = journal
            .read(cursor, READ_CHUNK.min(limit - printed))
            .with_context(|| format!("failed to read journal at offset {cursor}"))?;
        let Some(last) = batch.last() else {
            break;
        };
        cursor = last.offset + 1;
        printed += batch.len();
        out.write_all(format_batch(&batch, true).as_bytes())?;
    }

    Ok(printed)
}
