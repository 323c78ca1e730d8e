// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Journal commands
//!
//! The read-only commands read the journal files directly without the
//! journal lock. `repair` takes the lock and refuses to run while a node has
//! the journal open.

use crate::output::{print_list, OutputFormat};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Args, Subcommand, ValueEnum};
use dtx_core::DtxConfig;
use dtx_journal::{
    repair_stopped, verify, ChecksumKind, JournalConfig, JournalScanner, TxJournalEntry, TxOperation,
};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct JournalArgs {
    #[command(subcommand)]
    pub command: JournalCommand,
}

#[derive(Subcommand)]
pub enum JournalCommand {
    /// Print every record, oldest segment first
    Dump {
        #[command(flatten)]
        source: JournalSource,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Print the id of the last committed or rolled back transaction
    LastTx {
        #[command(flatten)]
        source: JournalSource,
    },
    /// Check every record of every segment
    Verify {
        #[command(flatten)]
        source: JournalSource,
    },
    /// Truncate the active file after its last valid record
    Repair {
        #[command(flatten)]
        source: JournalSource,
    },
}

/// Where the journal lives
#[derive(Args, Debug, Clone)]
pub struct JournalSource {
    /// Journal directory
    #[arg(long, required_unless_present = "config")]
    dir: Option<PathBuf>,
    /// Node configuration file to take journal settings from
    #[arg(long, conflicts_with = "dir")]
    config: Option<PathBuf>,
    /// Journal file name prefix
    #[arg(long)]
    prefix: Option<String>,
    /// Journal file name extension
    #[arg(long)]
    extension: Option<String>,
    /// Record checksum algorithm
    #[arg(long, value_enum)]
    checksum: Option<ChecksumArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ChecksumArg {
    Sha256,
    Crc32,
}

impl From<ChecksumArg> for ChecksumKind {
    fn from(arg: ChecksumArg) -> Self {
        match arg {
            ChecksumArg::Sha256 => ChecksumKind::Sha256,
            ChecksumArg::Crc32 => ChecksumKind::Crc32,
        }
    }
}

impl JournalSource {
    fn resolve(&self) -> Result<JournalConfig> {
        let mut config = match (&self.config, &self.dir) {
            (Some(path), _) => DtxConfig::load(path)?.journal,
            (None, Some(dir)) => JournalConfig::new(dir),
            (None, None) => bail!("either --dir or --config is required"),
        };
        if let Some(prefix) = &self.prefix {
            config.prefix = prefix.clone();
        }
        if let Some(extension) = &self.extension {
            config.extension = extension.clone();
        }
        if let Some(checksum) = self.checksum {
            config.checksum = checksum.into();
        }
        config.validate()?;
        if !config.dir.is_dir() {
            bail!("journal directory not found: {}", config.dir.display());
        }
        Ok(config)
    }
}

pub fn handle(args: JournalArgs) -> Result<()> {
    match args.command {
        JournalCommand::Dump { source, format } => dump(&source.resolve()?, format),
        JournalCommand::LastTx { source } => {
            match last_finished(&source.resolve()?)? {
                Some(tx_id) => println!("{}", tx_id),
                None => println!("none"),
            }
            Ok(())
        }
        JournalCommand::Verify { source } => verify_all(&source.resolve()?),
        JournalCommand::Repair { source } => repair_active(&source.resolve()?),
    }
}

#[derive(Serialize)]
struct RecordLine {
    segment: String,
    offset: u64,
    tx_id: i64,
    op: String,
    participants: usize,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<i32>,
}

impl RecordLine {
    fn new(segment: &Path, offset: u64, entry: &TxJournalEntry) -> Self {
        let (resource_id, error_code) = match &entry.operation {
            TxOperation::Start { message } => (Some(message.resource_id.to_string()), None),
            TxOperation::Commit => (None, None),
            TxOperation::Rollback { error_code } => (None, *error_code),
        };
        Self {
            segment: segment_name(segment),
            offset,
            tx_id: entry.tx_id,
            op: entry.op().to_string(),
            participants: entry.participants.len(),
            timestamp: format_timestamp(entry.timestamp_ms),
            resource_id,
            error_code,
        }
    }
}

impl fmt::Display for RecordLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:>10} tx={:<8} {:<8} participants={} {}",
            self.segment, self.offset, self.tx_id, self.op, self.participants, self.timestamp
        )?;
        if let Some(rm) = &self.resource_id {
            write!(f, " rm={}", rm)?;
        }
        if let Some(code) = self.error_code {
            write!(f, " error_code={}", code)?;
        }
        Ok(())
    }
}

fn format_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| millis.to_string())
}

fn segment_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn dump(config: &JournalConfig, format: OutputFormat) -> Result<()> {
    let codec = config.checksum.checksum();
    let mut lines = Vec::new();
    let mut failure = None;

    'segments: for path in config.segments()? {
        for scanned in JournalScanner::open(&path, codec.clone())? {
            let scanned = match scanned {
                Ok(scanned) => scanned,
                Err(e) => {
                    failure = Some(anyhow::Error::new(e));
                    break 'segments;
                }
            };
            let entry = TxJournalEntry::from_bytes(scanned.record.entry()).with_context(|| {
                format!("{} at offset {}", segment_name(&path), scanned.offset)
            })?;
            lines.push(RecordLine::new(&path, scanned.offset, &entry));
        }
    }

    print_list(&lines, format)?;
    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Highest terminal tx id of the newest segment that has one
fn last_finished(config: &JournalConfig) -> Result<Option<i64>> {
    let codec = config.checksum.checksum();
    for path in config.segments()?.iter().rev() {
        let mut last: Option<i64> = None;
        for scanned in JournalScanner::open(path, codec.clone())? {
            let scanned = scanned?;
            let entry = TxJournalEntry::from_bytes(scanned.record.entry())?;
            if entry.op().is_terminal() {
                last = Some(last.map_or(entry.tx_id, |l| l.max(entry.tx_id)));
            }
        }
        if last.is_some() {
            tracing::debug!(segment = %path.display(), ?last, "last finished transaction");
            return Ok(last);
        }
    }
    Ok(None)
}

fn verify_all(config: &JournalConfig) -> Result<()> {
    let codec = config.checksum.checksum();
    let segments = config.segments()?;
    if segments.is_empty() {
        println!("no journal files in {}", config.dir.display());
        return Ok(());
    }

    let mut corrupt = Vec::new();
    for path in &segments {
        let report = verify(path, codec.clone())?;
        let name = segment_name(path);
        println!("{}: {} records, {} bytes", name, report.records, report.valid_len);
        if report.has_partial_tail() {
            println!(
                "  partial record at offset {} ({} bytes)",
                report.valid_len,
                report.file_len - report.valid_len
            );
        }
        if let Some((offset, reason)) = report.corruption {
            println!("  corrupt record at offset {}: {}", offset, reason);
            corrupt.push(format!("{} at offset {}", name, offset));
        }
    }

    if !corrupt.is_empty() {
        bail!("journal is corrupt: {}", corrupt.join(", "));
    }
    Ok(())
}

fn repair_active(config: &JournalConfig) -> Result<()> {
    let path = config.active_path();
    if !path.is_file() {
        bail!("no active journal file at {}", path.display());
    }
    let removed = repair_stopped(config)?;
    println!("removed {} bytes from {}", removed, segment_name(&path));
    Ok(())
}
