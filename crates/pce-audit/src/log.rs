// log.rs — Append-only JSONL audit trail.
//
// One AuditRecord per line. Each record's `previous_hash` is the SHA-256 of
// the raw line before it, so edits, insertions and deletions break the chain.
// `verify` rechecks the chain without trusting any stored hash, and also
// rejects records that contradict themselves (see
// `AuditRecord::inconsistency`). A gate decision or ticket history can be
// pulled back out with an `AuditFilter`.

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::AuditError;
use crate::hasher;
use crate::record::{AuditAction, AuditRecord};

/// Selects records when reading the log back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    pub ticket_id: Option<String>,
    pub action: Option<AuditAction>,
}

impl AuditFilter {
    pub fn for_ticket(ticket_id: impl Into<String>) -> Self {
        Self {
            ticket_id: Some(ticket_id.into()),
            action: None,
        }
    }

    pub fn with_action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.ticket_id
            .as_deref()
            .map_or(true, |id| record.is_for_ticket(id))
            && self.action.map_or(true, |a| record.action == a)
    }
}

/// Summary of a verified log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainReport {
    pub records: usize,
    pub allowed: usize,
    pub blocked: usize,
    /// Every ticket any record names.
    pub tickets: BTreeSet<String>,
}

/// A non-blank line of the log with its 1-based line number.
struct RawLine {
    number: usize,
    text: String,
}

/// An append-only audit log backed by a JSONL file.
pub struct AuditLog {
    file: File,
    path: PathBuf,
    /// Hash of the last line; becomes the next record's `previous_hash`.
    head: Option<String>,
    records: usize,
}

impl AuditLog {
    /// Open (or create) a log, picking the chain up where it ended.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        let open_failed = |source| AuditError::OpenFailed {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(open_failed)?;
        }

        let existing = if path.exists() {
            raw_lines(&path)?
        } else {
            Vec::new()
        };
        let head = existing.last().map(|l| hasher::hash_str(&l.text));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(open_failed)?;

        Ok(Self {
            file,
            head,
            records: existing.len(),
            path,
        })
    }

    /// Link `record` to the chain head and append it as one line.
    pub fn append(&mut self, record: &mut AuditRecord) -> Result<(), AuditError> {
        record.previous_hash = self.head.clone();
        let json = serde_json::to_string(record)?;

        self.file
            .write_all(format!("{}\n", json).as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|source| AuditError::WriteFailed {
                path: self.path.clone(),
                source,
            })?;

        self.head = Some(hasher::hash_str(&json));
        self.records += 1;
        tracing::debug!(
            record = %record.record_id,
            action = %record.action,
            ticket = record.ticket_id.as_deref().unwrap_or("-"),
            "audit record appended"
        );
        Ok(())
    }

    /// Number of records in the log, including ones written before `open`.
    pub fn len(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record, oldest first.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<AuditRecord>, AuditError> {
        Self::read(path, &AuditFilter::default())
    }

    /// Records selected by `filter`, oldest first.
    pub fn read(
        path: impl AsRef<Path>,
        filter: &AuditFilter,
    ) -> Result<Vec<AuditRecord>, AuditError> {
        let mut records = Vec::new();
        for line in raw_lines(path.as_ref())? {
            let record = parse(&line)?;
            if filter.matches(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Recheck the hash chain and every record's internal consistency.
    ///
    /// Stops at the first broken link (`IntegrityViolation`) or
    /// self-contradicting record (`InconsistentRecord`).
    pub fn verify(path: impl AsRef<Path>) -> Result<ChainReport, AuditError> {
        let mut report = ChainReport::default();
        let mut expected: Option<String> = None;

        for line in raw_lines(path.as_ref())? {
            let record = parse(&line)?;
            if record.previous_hash != expected {
                return Err(AuditError::IntegrityViolation {
                    line: line.number,
                    expected: expected.unwrap_or_else(|| "None".to_string()),
                    actual: record.previous_hash.unwrap_or_else(|| "None".to_string()),
                });
            }
            if let Some(reason) = record.inconsistency() {
                return Err(AuditError::InconsistentRecord {
                    line: line.number,
                    reason,
                });
            }

            if record.action == AuditAction::GateDecision {
                match record.metadata.get("verdict").and_then(|v| v.as_str()) {
                    Some("allow") => report.allowed += 1,
                    _ => report.blocked += 1,
                }
            }
            if let Some(id) = record.ticket_id {
                report.tickets.insert(id);
            }
            report.records += 1;
            // The raw line, not a re-serialization, so field order is kept.
            expected = Some(hasher::hash_str(&line.text));
        }

        Ok(report)
    }
}

fn raw_lines(path: &Path) -> Result<Vec<RawLine>, AuditError> {
    let content = std::fs::read_to_string(path).map_err(|source| AuditError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(content
        .lines()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| RawLine {
            number: i + 1,
            text: text.to_string(),
        })
        .collect())
}

fn parse(line: &RawLine) -> Result<AuditRecord, AuditError> {
    serde_json::from_str(&line.text).map_err(|source| AuditError::MalformedLine {
        line: line.number,
        source,
    })
}
