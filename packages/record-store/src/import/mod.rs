//! Import Reconciler
//!
//! Reconciles repeated full imports of a source without diffing its content:
//!
//! 1. `prepare_import` snapshots the identities currently filed under the source
//! 2. `update` inserts each incoming record; a duplicate identity is crossed off
//!    the snapshot because the source still contains it
//! 3. `close_import` removes whatever is left in the snapshot, i.e. records the
//!    source no longer contains
//!
//! Per source the reconciler moves `Idle -> Importing -> Idle`. Callers must not
//! run two passes of the same source at once.

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::domain::{Record, RecordId, SourceId};
use crate::error::{Result, StoreError};
use crate::store::{InsertOutcome, SharedStore};

/// Result of [`ImportReconciler::update`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The record was new to the store
    Inserted { identity: RecordId },
    /// The record was already live and is kept by this pass
    Reconfirmed { identity: RecordId, version: u64 },
    /// The identity is live under another source. The record is accepted but
    /// stays filed under `recorded_source`.
    SourceMismatch {
        identity: RecordId,
        version: u64,
        claimed_source: SourceId,
        recorded_source: SourceId,
    },
}

impl UpdateOutcome {
    pub fn identity(&self) -> &str {
        match self {
            UpdateOutcome::Inserted { identity }
            | UpdateOutcome::Reconfirmed { identity, .. }
            | UpdateOutcome::SourceMismatch { identity, .. } => identity,
        }
    }

    pub fn is_anomaly(&self) -> bool {
        matches!(self, UpdateOutcome::SourceMismatch { .. })
    }
}

/// What one import pass did to the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub source: SourceId,
    pub pass: u64,
    pub inserted: usize,
    pub reconfirmed: usize,
    pub anomalies: usize,
    /// Identities swept at close because the source no longer contains them
    pub removed: Vec<RecordId>,
}

/// Open import pass of one source
#[derive(Debug, Clone)]
pub struct ImportSession {
    source: SourceId,
    pass: u64,
    /// Pending-removal snapshot; confirmed entries are nulled out
    pending: Vec<Option<RecordId>>,
    /// identity -> slot in `pending`
    slots: HashMap<RecordId, usize>,
    inserted: usize,
    reconfirmed: usize,
    anomalies: usize,
}

impl ImportSession {
    fn new(source: SourceId, pass: u64, snapshot: Vec<RecordId>) -> Self {
        let slots = snapshot
            .iter()
            .enumerate()
            .map(|(slot, identity)| (identity.clone(), slot))
            .collect();
        Self {
            source,
            pass,
            pending: snapshot.into_iter().map(Some).collect(),
            slots,
            inserted: 0,
            reconfirmed: 0,
            anomalies: 0,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn pass(&self) -> u64 {
        self.pass
    }

    /// Snapshot entries not yet reconfirmed
    pub fn pending_count(&self) -> usize {
        self.pending.iter().filter(|entry| entry.is_some()).count()
    }

    pub fn is_pending(&self, identity: &str) -> bool {
        self.slots
            .get(identity)
            .is_some_and(|&slot| self.pending[slot].is_some())
    }

    /// Cross `identity` off the snapshot. Returns `false` if it was not pending.
    fn confirm(&mut self, identity: &str) -> bool {
        match self.slots.remove(identity) {
            Some(slot) => self.pending[slot].take().is_some(),
            None => false,
        }
    }
}

/// Single writer driving import passes against a shared store
pub struct ImportReconciler {
    store: SharedStore,
    sessions: HashMap<SourceId, ImportSession>,
}

impl ImportReconciler {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            sessions: HashMap::new(),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn is_importing(&self, source: &str) -> bool {
        self.sessions.contains_key(source)
    }

    pub fn session(&self, source: &str) -> Option<&ImportSession> {
        self.sessions.get(source)
    }

    /// Start a pass for `source` and return its pass number
    ///
    /// An open session of the same source is replaced; its undrained snapshot
    /// is dropped without sweeping.
    pub fn prepare_import(&mut self, source: &str) -> u64 {
        let (pass, snapshot) = {
            let mut store = self.store.write();
            let pass = store.next_import_pass(source);
            (pass, store.source_records(source))
        };

        info!(
            "prepare import of {} (pass {}, {} known records)",
            source,
            pass,
            snapshot.len()
        );

        let session = ImportSession::new(source.to_string(), pass, snapshot);
        if let Some(previous) = self.sessions.insert(source.to_string(), session) {
            let undrained = previous.pending_count();
            if undrained > 0 {
                warn!(
                    "discarded pass {} of {} with {} undrained records",
                    previous.pass, source, undrained
                );
            }
        }
        pass
    }

    /// Route one record of an open pass through insert-or-reconfirm
    pub fn update(&mut self, record: Record) -> Result<UpdateOutcome> {
        let claimed_source = record.source().to_string();
        let session = self
            .sessions
            .get_mut(&claimed_source)
            .ok_or_else(|| StoreError::no_active_session(&claimed_source))?;

        let mut store = self.store.write();
        let (identity, version) = match store.insert(record) {
            InsertOutcome::Inserted(identity) => {
                // still pending if it was removed elsewhere during this pass
                session.confirm(&identity);
                session.inserted += 1;
                return Ok(UpdateOutcome::Inserted { identity });
            }
            InsertOutcome::Duplicate { identity, version } => (identity, version),
        };

        if session.confirm(&identity) {
            session.reconfirmed += 1;
            return Ok(UpdateOutcome::Reconfirmed { identity, version });
        }

        let recorded_source = store
            .get(&identity)
            .map(|r| r.source().to_string())
            .unwrap_or_default();

        if recorded_source == claimed_source {
            // repeated within this pass, or inserted earlier in it
            session.reconfirmed += 1;
            return Ok(UpdateOutcome::Reconfirmed { identity, version });
        }

        session.anomalies += 1;
        warn!(
            "record {} claimed by {} is filed under {}",
            identity, claimed_source, recorded_source
        );
        Ok(UpdateOutcome::SourceMismatch {
            identity,
            version,
            claimed_source,
            recorded_source,
        })
    }

    /// Finish the pass of `source`, removing records it no longer contains
    pub fn close_import(&mut self, source: &str) -> Result<ImportSummary> {
        let mut session = self
            .sessions
            .remove(source)
            .ok_or_else(|| StoreError::no_active_session(source))?;

        let mut removed = Vec::new();
        {
            let mut store = self.store.write();
            while let Some(entry) = session.pending.pop() {
                let Some(identity) = entry else { continue };
                match store.remove(&identity) {
                    Ok(_) => removed.push(identity),
                    Err(e) => debug!("stale entry {} already gone: {}", identity, e),
                }
            }
        }

        let summary = ImportSummary {
            source: session.source,
            pass: session.pass,
            inserted: session.inserted,
            reconfirmed: session.reconfirmed,
            anomalies: session.anomalies,
            removed,
        };
        info!(
            "closed import of {} (pass {}): {} inserted, {} reconfirmed, {} removed, {} anomalies",
            summary.source,
            summary.pass,
            summary.inserted,
            summary.reconfirmed,
            summary.removed.len(),
            summary.anomalies
        );
        Ok(summary)
    }
}
