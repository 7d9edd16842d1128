// store.rs — TicketStore: persistence for policy tickets.
//
// Each ticket is stored as a JSON file: `<store_dir>/<ticket_id>.json`,
// written to a temp file and renamed into place so readers never see a torn
// record. Tickets are never deleted.
//
// Writes to the same ticket are serialized through a per-ticket lock; writes
// to different tickets never contend. Every mutation is load → change → save
// under that lock, so concurrent approvals cannot lose each other's updates.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::approval::{ApprovalEvent, ApprovalOutcome, ApprovalResolver};
use crate::error::TicketError;
use crate::linker::TicketSource;
use crate::ticket::{PolicyTicket, TicketId, TicketStatus};

/// Persistent store for policy tickets.
pub struct TicketStore {
    store_dir: PathBuf,
    locks: Mutex<HashMap<TicketId, Arc<Mutex<()>>>>,
}

impl TicketStore {
    /// Create a new store backed by the given directory.
    /// Creates the directory if it doesn't exist.
    pub fn new(store_dir: impl AsRef<Path>) -> Result<Self, TicketError> {
        let store_dir = store_dir.as_ref().to_path_buf();
        fs::create_dir_all(&store_dir).map_err(|source| TicketError::IoError {
            path: store_dir.display().to_string(),
            source,
        })?;
        Ok(Self {
            store_dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.store_dir
    }

    /// Store a new ticket. Fails if one with the same id exists.
    pub fn create(&self, ticket: &PolicyTicket) -> Result<(), TicketError> {
        let lock = self.lock_for(&ticket.id)?;
        let _guard = lock
            .lock()
            .map_err(|e| TicketError::LockPoisoned(e.to_string()))?;
        if self.ticket_file(&ticket.id).exists() {
            return Err(TicketError::AlreadyExists {
                id: ticket.id.to_string(),
            });
        }
        self.save(ticket)?;
        tracing::info!(ticket = %ticket.id, domain = %ticket.domain, "ticket created");
        Ok(())
    }

    /// Get a ticket by id.
    pub fn get(&self, id: &TicketId) -> Result<Option<PolicyTicket>, TicketError> {
        let path = self.ticket_file(id);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path).map_err(|source| TicketError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// List all tickets, sorted by id.
    pub fn list(&self) -> Result<Vec<PolicyTicket>, TicketError> {
        let mut tickets = Vec::new();

        let entries = fs::read_dir(&self.store_dir).map_err(|source| TicketError::IoError {
            path: self.store_dir.display().to_string(),
            source,
        })?;

        for entry in entries {
            let entry = entry.map_err(|source| TicketError::IoError {
                path: self.store_dir.display().to_string(),
                source,
            })?;
            let path = entry.path();

            if path.extension().is_some_and(|ext| ext == "json") {
                let json = fs::read_to_string(&path).map_err(|source| TicketError::IoError {
                    path: path.display().to_string(),
                    source,
                })?;
                match serde_json::from_str::<PolicyTicket>(&json) {
                    Ok(ticket) => tickets.push(ticket),
                    Err(e) => tracing::warn!(path = %path.display(), "skipping unreadable ticket: {}", e),
                }
            }
        }

        tickets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tickets)
    }

    /// List tickets in a given status.
    pub fn list_by_status(&self, status: TicketStatus) -> Result<Vec<PolicyTicket>, TicketError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|t| t.status == status)
            .collect())
    }

    /// Load, mutate, and save one ticket under its lock.
    ///
    /// The ticket is only written back if `f` succeeds.
    pub fn update<T, F>(&self, id: &TicketId, f: F) -> Result<(T, PolicyTicket), TicketError>
    where
        F: FnOnce(&mut PolicyTicket) -> Result<T, TicketError>,
    {
        let lock = self.lock_for(id)?;
        let _guard = lock
            .lock()
            .map_err(|e| TicketError::LockPoisoned(e.to_string()))?;

        let mut ticket = self
            .get(id)?
            .ok_or_else(|| TicketError::TicketNotFound { id: id.to_string() })?;
        let before = ticket.clone();
        let value = f(&mut ticket)?;
        if ticket != before {
            self.save(&ticket)?;
        }
        Ok((value, ticket))
    }

    /// Apply an approval event to a stored ticket.
    pub fn approve(
        &self,
        id: &TicketId,
        resolver: &ApprovalResolver,
        event: &ApprovalEvent,
    ) -> Result<(ApprovalOutcome, PolicyTicket), TicketError> {
        self.update(id, |ticket| resolver.approve(ticket, event))
    }

    /// Reject a stored ticket. Returns whether the status changed.
    pub fn reject(
        &self,
        id: &TicketId,
        identity: &str,
        reason: &str,
    ) -> Result<(bool, PolicyTicket), TicketError> {
        self.update(id, |ticket| ApprovalResolver::reject(ticket, identity, reason))
    }

    /// Mark an evidence item complete or incomplete. Idempotent.
    ///
    /// Returns whether the recorded value changed.
    pub fn record_evidence(
        &self,
        id: &TicketId,
        item: &str,
        complete: bool,
    ) -> Result<(bool, PolicyTicket), TicketError> {
        self.update(id, |ticket| {
            if ticket.status == TicketStatus::Rejected {
                return Err(TicketError::TicketClosed {
                    ticket_id: ticket.id.to_string(),
                    status: ticket.status.to_string(),
                });
            }
            let item = item.trim();
            if ticket.evidence.get(item) == Some(&complete) {
                return Ok(false);
            }
            ticket.evidence.insert(item.to_string(), complete);
            ticket.updated_at = Utc::now();
            tracing::info!(ticket = %ticket.id, item = %item, complete, "evidence recorded");
            Ok(true)
        })
    }

    fn save(&self, ticket: &PolicyTicket) -> Result<(), TicketError> {
        let path = self.ticket_file(&ticket.id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(ticket)?;
        fs::write(&tmp, json).map_err(|source| TicketError::IoError {
            path: tmp.display().to_string(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| TicketError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    fn lock_for(&self, id: &TicketId) -> Result<Arc<Mutex<()>>, TicketError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|e| TicketError::LockPoisoned(e.to_string()))?;
        Ok(Arc::clone(locks.entry(id.clone()).or_default()))
    }

    /// Path to the JSON file for a given ticket.
    fn ticket_file(&self, id: &TicketId) -> PathBuf {
        self.store_dir.join(format!("{}.json", id))
    }
}

impl TicketSource for TicketStore {
    fn load_ticket(&self, id: &TicketId) -> Result<Option<PolicyTicket>, TicketError> {
        self.get(id)
    }
}
