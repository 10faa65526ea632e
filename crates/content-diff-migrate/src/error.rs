//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required entity is absent at the source.
    ///
    /// Fatal: raised during extraction, before any destination write.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// A destination write did not affect exactly one row.
    ///
    /// Reported per entity; the importer keeps going through the rest of
    /// the subgraph rather than aborting it.
    #[error("Destination write failed for {table}: {detail}")]
    InsertFailed { table: String, detail: String },

    /// A second, different destination id was recorded for the same
    /// (kind, source id) pair. Signals an extractor/importer bug, not a
    /// recoverable condition.
    #[error("Conflicting remap for {kind} {old_id}: {existing} already recorded, attempted {attempted}")]
    ConflictingRemap {
        kind: &'static str,
        old_id: i64,
        existing: i64,
        attempted: i64,
    },

    /// A foreign key could not be remapped. The referencing row is dropped
    /// or the relationship skipped; a stale id is never written.
    #[error("Unresolved {kind} reference {old_id}")]
    UnresolvedReference { kind: &'static str, old_id: i64 },

    /// A row column was missing or carried an unexpected type.
    #[error("Row decode error: {0}")]
    Decode(String),

    /// Underlying row-store error.
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create an InsertFailed error.
    pub fn insert_failed(table: impl Into<String>, detail: impl Into<String>) -> Self {
        MigrateError::InsertFailed {
            table: table.into(),
            detail: detail.into(),
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        // Add error chain for wrapped errors
        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
