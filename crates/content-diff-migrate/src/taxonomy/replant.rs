//! Category tree relocation.

use std::sync::Arc;

use tracing::{debug, info};

use crate::entity::{tables, CATEGORY_TAXONOMY};
use crate::error::{MigrateError, Result};
use crate::graph::Catalog;
use crate::store::{Row, RowStore, TableNamespace, Value};

use super::CategoryNode;

/// Outcome of one replant run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplantStats {
    /// Categories created fresh under the new parent.
    pub created: u64,

    /// Existing destination categories reused as targets.
    pub reused: u64,

    /// Content relationships rewritten to target categories.
    pub relationships_moved: u64,
}

/// Relocates a category subtree under a new parent.
///
/// The same find-existing-or-create-then-reassign pattern as the graph
/// importer, specialized for the self-referential category tree.
pub struct Replanter {
    store: Arc<dyn RowStore>,
    catalog: Catalog,
    ns: TableNamespace,
}

impl Replanter {
    /// Create a replanter over the given namespace.
    pub fn new(store: Arc<dyn RowStore>, ns: TableNamespace) -> Self {
        let catalog = Catalog::new(store.clone(), ns.clone());
        Self { store, catalog, ns }
    }

    /// Uproot `tree` and permanently relocate it under `new_parent_id`
    /// (a taxonomy-entry id; 0 plants at the root).
    ///
    /// Per node, pre-order: reuse an existing destination category matching
    /// (name, description, parent) or free up the source slug and recreate
    /// the category, then rewrite every content relationship from the old
    /// taxonomy-entry id to the target's in one update. A tree with cyclic
    /// parent references is not a supported input.
    pub async fn replant(&self, tree: &CategoryNode, new_parent_id: i64) -> Result<ReplantStats> {
        let terms_table = self.ns.table(tables::TERMS);
        let rel_table = self.ns.table(tables::TERM_RELATIONSHIPS);

        let mut stats = ReplantStats::default();
        let mut stack: Vec<(&CategoryNode, i64)> = vec![(tree, new_parent_id)];

        while let Some((node, parent_id)) = stack.pop() {
            let target_id = match self
                .catalog
                .find_category(&node.name, &node.description, parent_id)
                .await?
            {
                Some((_, existing)) => {
                    debug!(
                        "Category {} already present under {} as {}",
                        node.name, parent_id, existing.term_taxonomy_id
                    );
                    stats.reused += 1;
                    existing.term_taxonomy_id
                }
                None => {
                    // Free up the slug so the recreated category gets the
                    // nice version of it. This write is load-bearing: a
                    // failed rename fails the whole operation.
                    let renamed = self
                        .store
                        .update(
                            &terms_table,
                            &Row::new().with("slug", format!("{}_x", node.slug)),
                            &[("term_id", Value::I64(node.term_id))],
                        )
                        .await?;
                    if renamed != 1 {
                        return Err(MigrateError::insert_failed(
                            &terms_table,
                            format!(
                                "slug rename for term {} affected {} rows",
                                node.term_id, renamed
                            ),
                        ));
                    }

                    let created = self.create_category(node, parent_id).await?;
                    stats.created += 1;
                    created
                }
            };

            // Direct relationship rewrite, not a row-by-row move.
            let moved = self
                .store
                .update(
                    &rel_table,
                    &Row::new().with("term_taxonomy_id", target_id),
                    &[("term_taxonomy_id", Value::I64(node.term_taxonomy_id))],
                )
                .await?;
            stats.relationships_moved += moved;
            debug!(
                "Category {} -> {} ({} relationships moved)",
                node.term_taxonomy_id, target_id, moved
            );

            for child in node.children.iter().rev() {
                stack.push((child, target_id));
            }
        }

        info!(
            "Replanted {} under {}: {} created, {} reused, {} relationships moved",
            tree.name, new_parent_id, stats.created, stats.reused, stats.relationships_moved
        );
        Ok(stats)
    }

    /// Create one category (not its children) under a parent, returning the
    /// new taxonomy-entry id.
    async fn create_category(&self, node: &CategoryNode, parent_id: i64) -> Result<i64> {
        let term_id = self
            .store
            .insert(
                &self.ns.table(tables::TERMS),
                &Row::new()
                    .with("name", node.name.clone())
                    .with("slug", node.slug.clone()),
            )
            .await?;

        self.store
            .insert(
                &self.ns.table(tables::TERM_TAXONOMY),
                &Row::new()
                    .with("term_id", term_id)
                    .with("taxonomy", CATEGORY_TAXONOMY)
                    .with("description", node.description.clone())
                    .with("parent_id", parent_id)
                    .with("count", 0i64),
            )
            .await
    }
}
