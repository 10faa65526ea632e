//! Per-import outcome reporting and audit trail.

use serde::Serialize;

use crate::graph::RemapKind;

/// What happened to one reference during import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportOutcome {
    /// Inserted fresh at the destination.
    Migrated,
    /// An existing destination row was reused (natural-key dedup).
    Reused,
    /// Dropped or left unlinked because a reference could not be resolved.
    Skipped,
}

/// One audited reference: how a source id was (or was not) carried over.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub kind: RemapKind,
    pub old_id: i64,
    pub new_id: Option<i64>,
    pub outcome: ImportOutcome,
}

/// Result of importing one snapshot.
///
/// Counters cover every written unit (entity and metadata rows); the audit
/// trail records id-bearing entities only, one entry per remapped, reused,
/// or dangling reference, for manual cleanup after partial failures.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    /// Destination id assigned to the root content item.
    pub item_id: i64,

    /// Rows inserted fresh.
    pub migrated: u64,

    /// Existing destination rows reused.
    pub reused: u64,

    /// References dropped or relationships skipped as unresolvable.
    pub skipped: u64,

    /// Writes that failed and were carried past (best effort).
    pub failed: u64,

    /// Trail of every id-bearing reference decision.
    pub audit: Vec<AuditEntry>,
}

impl ImportReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an id-bearing reference decision: bumps the matching counter
    /// and appends to the audit trail.
    pub fn record(
        &mut self,
        kind: RemapKind,
        old_id: i64,
        new_id: Option<i64>,
        outcome: ImportOutcome,
    ) {
        match outcome {
            ImportOutcome::Migrated => self.migrated += 1,
            ImportOutcome::Reused => self.reused += 1,
            ImportOutcome::Skipped => self.skipped += 1,
        }
        self.audit.push(AuditEntry {
            kind,
            old_id,
            new_id,
            outcome,
        });
    }

    /// Count a successful write that carries no remappable id (metadata,
    /// relationship rows).
    pub fn record_row(&mut self) {
        self.migrated += 1;
    }

    /// Count a failed write that the import carried past.
    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// Total units the import touched.
    #[must_use]
    pub fn units(&self) -> u64 {
        self.migrated + self.reused + self.skipped + self.failed
    }
}
