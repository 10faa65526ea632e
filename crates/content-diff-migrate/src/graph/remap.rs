//! Run-scoped identity remapping.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{MigrateError, Result};

/// Entity kinds whose identifiers get remapped during an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemapKind {
    Item,
    Author,
    Comment,
    Term,
    TermTaxonomy,
}

impl RemapKind {
    /// Stable lowercase name, used in logs and audit output.
    pub fn as_str(self) -> &'static str {
        match self {
            RemapKind::Item => "item",
            RemapKind::Author => "author",
            RemapKind::Comment => "comment",
            RemapKind::Term => "term",
            RemapKind::TermTaxonomy => "term_taxonomy",
        }
    }
}

impl std::fmt::Display for RemapKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mapping from (entity kind, source id) to destination id, scoped to one
/// migration run.
///
/// Write-once per key: recording the same mapping again is a no-op reuse,
/// while recording a different destination id for an already-mapped key is
/// a `ConflictingRemap`, which signals an extractor/importer bug rather
/// than a recoverable condition.
#[derive(Debug, Default)]
pub struct RemapTable {
    entries: HashMap<(RemapKind, i64), i64>,
}

impl RemapTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the destination id recorded for a source id.
    pub fn get(&self, kind: RemapKind, old_id: i64) -> Option<i64> {
        self.entries.get(&(kind, old_id)).copied()
    }

    /// Record a mapping.
    pub fn put(&mut self, kind: RemapKind, old_id: i64, new_id: i64) -> Result<()> {
        match self.entries.get(&(kind, old_id)) {
            Some(existing) if *existing != new_id => Err(MigrateError::ConflictingRemap {
                kind: kind.as_str(),
                old_id,
                existing: *existing,
                attempted: new_id,
            }),
            Some(_) => Ok(()),
            None => {
                self.entries.insert((kind, old_id), new_id);
                Ok(())
            }
        }
    }

    /// Number of recorded mappings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no mappings have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
