//! Migration orchestrator - main workflow coordinator.
//!
//! Runs one content diff migration end to end: list the live items missing
//! from the local installation, transplant each one's entity graph, then
//! repair the aggregate counts the bulk relationship writes invalidated.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::entity::{tables, ItemRow};
use crate::error::{MigrateError, Result};
use crate::graph::{GraphExtractor, GraphImporter};
use crate::store::{MysqlStore, RowStore, Value};
use crate::taxonomy::recount_taxonomy;

/// Migration orchestrator.
pub struct Orchestrator {
    config: Config,
    store: Arc<dyn RowStore>,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// New items found by the diff.
    pub items_total: usize,

    /// Items whose graphs were imported.
    pub items_imported: usize,

    /// Items that failed to extract or import.
    pub items_failed: usize,

    /// Rows inserted fresh across all imports.
    pub rows_migrated: u64,

    /// Existing destination rows reused across all imports.
    pub rows_reused: u64,

    /// References dropped or skipped as unresolvable.
    pub references_skipped: u64,

    /// Writes that failed and were carried past.
    pub rows_failed: u64,

    /// Taxonomy counts repaired after the import pass.
    pub counts_repaired: u64,

    /// Source ids of failed items.
    pub failed_items: Vec<i64>,
}

impl Orchestrator {
    /// Create a new orchestrator connected per the configuration.
    pub async fn new(config: Config) -> Result<Self> {
        let store = MysqlStore::new(&config.database).await?;
        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Create an orchestrator over an injected store.
    pub fn with_store(config: Config, store: Arc<dyn RowStore>) -> Self {
        Self { config, store }
    }

    /// List live items absent from the local installation.
    ///
    /// An item counts as new when no local item of the configured types
    /// shares its natural key (slug, title, status, creation time).
    pub async fn list_new_item_ids(&self) -> Result<Vec<i64>> {
        let source = self.config.source.namespace();
        let local = self.config.local.namespace();

        let mut ids = Vec::new();
        for item_type in &self.config.migration.item_types {
            let rows = self
                .store
                .select(
                    &source.table(tables::ITEMS),
                    &[("item_type", item_type.as_str().into())],
                )
                .await?;

            for row in &rows {
                let item = ItemRow::from_row(row)?;
                let existing = self
                    .store
                    .select_one(
                        &local.table(tables::ITEMS),
                        &[
                            ("slug", Value::Text(item.slug.clone())),
                            ("title", Value::Text(item.title.clone())),
                            ("status", Value::Text(item.status.clone())),
                            ("created_at", Value::DateTime(item.created_at)),
                        ],
                    )
                    .await?;
                if existing.is_none() {
                    ids.push(item.item_id);
                }
            }
        }

        Ok(ids)
    }

    /// Run the migration.
    pub async fn run(&self) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting content diff run: {}", run_id);

        let source = self.config.source.namespace();
        let local = self.config.local.namespace();

        // Phase 1: Diff
        info!("Phase 1: Diffing live content against local");
        let ids = self.list_new_item_ids().await?;
        info!("Found {} new items to migrate", ids.len());

        let extractor = GraphExtractor::new(self.store.clone());
        let importer = GraphImporter::new(self.store.clone(), local.clone());

        // Phase 2: Transplant each entity graph
        info!("Phase 2: Importing entity graphs");
        let mut items_imported = 0;
        let mut failed_items = Vec::new();
        let mut rows_migrated = 0;
        let mut rows_reused = 0;
        let mut references_skipped = 0;
        let mut rows_failed = 0;
        let mut taxonomy_kinds: BTreeSet<String> = BTreeSet::new();

        for (idx, &item_id) in ids.iter().enumerate() {
            let snapshot = match extractor.extract(item_id, &source).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(
                        "({}/{}) item {}: extraction failed - {}",
                        idx + 1,
                        ids.len(),
                        item_id,
                        e
                    );
                    failed_items.push(item_id);
                    continue;
                }
            };

            for taxonomy in &snapshot.taxonomies {
                taxonomy_kinds.insert(taxonomy.taxonomy.clone());
            }

            match importer.import(&snapshot).await {
                Ok(report) => {
                    info!(
                        "({}/{}) item {} imported as {}",
                        idx + 1,
                        ids.len(),
                        item_id,
                        report.item_id
                    );
                    items_imported += 1;
                    rows_migrated += report.migrated;
                    rows_reused += report.reused;
                    references_skipped += report.skipped;
                    rows_failed += report.failed;
                }
                // A remap conflict means the run itself is unsound.
                Err(e @ MigrateError::ConflictingRemap { .. }) => return Err(e),
                Err(e) => {
                    warn!(
                        "({}/{}) item {}: import failed - {}",
                        idx + 1,
                        ids.len(),
                        item_id,
                        e
                    );
                    failed_items.push(item_id);
                }
            }
        }

        // Phase 3: Repair derived aggregates
        let mut counts_repaired = 0;
        if self.config.migration.repair_counts && !taxonomy_kinds.is_empty() {
            info!(
                "Phase 3: Repairing counts for {} taxonomy kinds",
                taxonomy_kinds.len()
            );
            for kind in &taxonomy_kinds {
                counts_repaired += recount_taxonomy(self.store.as_ref(), &local, kind).await?;
            }
        }

        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;
        let items_failed = failed_items.len();
        let status = if items_failed > 0 { "failed" } else { "completed" };

        let result = MigrationResult {
            run_id,
            status: status.to_string(),
            duration_seconds: duration,
            started_at,
            completed_at,
            items_total: ids.len(),
            items_imported,
            items_failed,
            rows_migrated,
            rows_reused,
            references_skipped,
            rows_failed,
            counts_repaired,
            failed_items,
        };

        info!(
            "Migration {}: {}/{} items in {:.1}s ({} rows migrated, {} reused, {} skipped)",
            result.status,
            result.items_imported,
            result.items_total,
            result.duration_seconds,
            result.rows_migrated,
            result.rows_reused,
            result.references_skipped
        );

        Ok(result)
    }
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
