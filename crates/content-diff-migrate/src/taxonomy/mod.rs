//! Category tree operations over the self-referential taxonomy table.
//!
//! A category is a term attached to the hierarchical taxonomy kind, with
//! `parent_id` pointing at the parent's taxonomy entry. [`CategoryTree`]
//! materializes a nested tree out of that relation and deletes whole
//! subtrees; [`Replanter`] relocates a materialized tree under a new parent.
//!
//! Traversals use explicit work stacks/queues, so tree depth never grows
//! the call stack.

pub mod counts;
pub mod replant;

pub use counts::recount_taxonomy;
pub use replant::{Replanter, ReplantStats};

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::entity::{tables, TermRow, TermTaxonomyRow};
use crate::error::{MigrateError, Result};
use crate::graph::Catalog;
use crate::store::{RowStore, TableNamespace, Value};

/// One category with its full ordered subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryNode {
    pub term_id: i64,
    pub term_taxonomy_id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub parent_id: i64,
    pub count: i64,
    pub children: Vec<CategoryNode>,
}

impl CategoryNode {
    /// Build a leaf node from its term and taxonomy rows.
    pub fn from_rows(term: TermRow, taxonomy: TermTaxonomyRow) -> Self {
        Self {
            term_id: term.term_id,
            term_taxonomy_id: taxonomy.term_taxonomy_id,
            name: term.name,
            slug: term.slug,
            description: taxonomy.description,
            parent_id: taxonomy.parent_id,
            count: taxonomy.count,
            children: Vec::new(),
        }
    }

    /// Total node count of this subtree, the node itself included.
    #[must_use]
    pub fn size(&self) -> usize {
        let mut total = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            total += 1;
            stack.extend(node.children.iter());
        }
        total
    }
}

/// Materializes and deletes category subtrees in one namespace.
pub struct CategoryTree {
    store: Arc<dyn RowStore>,
    catalog: Catalog,
    ns: TableNamespace,
}

impl CategoryTree {
    /// Create tree operations over the given namespace.
    pub fn new(store: Arc<dyn RowStore>, ns: TableNamespace) -> Self {
        let catalog = Catalog::new(store.clone(), ns.clone());
        Self { store, catalog, ns }
    }

    /// Fetch a category and nest every descendant under it, preserving
    /// store order among siblings.
    ///
    /// Finite only because the parent relation is expected to be acyclic.
    pub async fn materialize(&self, term_taxonomy_id: i64) -> Result<CategoryNode> {
        let tt_row = self
            .store
            .select_one(
                &self.ns.table(tables::TERM_TAXONOMY),
                &[("term_taxonomy_id", Value::I64(term_taxonomy_id))],
            )
            .await?
            .ok_or(MigrateError::NotFound {
                entity: "term_taxonomy",
                id: term_taxonomy_id,
            })?;
        let taxonomy = TermTaxonomyRow::from_row(&tt_row)?;

        let term_row = self
            .store
            .select_one(
                &self.ns.table(tables::TERMS),
                &[("term_id", Value::I64(taxonomy.term_id))],
            )
            .await?
            .ok_or(MigrateError::NotFound {
                entity: "term",
                id: taxonomy.term_id,
            })?;
        let term = TermRow::from_row(&term_row)?;

        // Breadth-first discovery pass.
        let root_id = taxonomy.term_taxonomy_id;
        let mut order = vec![root_id];
        let mut nodes = HashMap::from([(root_id, CategoryNode::from_rows(term, taxonomy))]);
        let mut parent_of: HashMap<i64, i64> = HashMap::new();
        let mut queue = VecDeque::from([root_id]);

        while let Some(id) = queue.pop_front() {
            for (child_term, child_taxonomy) in self.catalog.category_children(id).await? {
                let child_id = child_taxonomy.term_taxonomy_id;
                order.push(child_id);
                parent_of.insert(child_id, id);
                nodes.insert(child_id, CategoryNode::from_rows(child_term, child_taxonomy));
                queue.push_back(child_id);
            }
        }

        // Bottom-up assembly: reversed discovery order guarantees every
        // node's children are complete before it is attached. Pushing
        // reverses sibling order, so each node flips its list once.
        for &id in order.iter().skip(1).rev() {
            if let Some(mut node) = nodes.remove(&id) {
                node.children.reverse();
                if let Some(parent) = nodes.get_mut(&parent_of[&id]) {
                    parent.children.push(node);
                }
            }
        }

        let mut root = nodes.remove(&root_id).ok_or(MigrateError::NotFound {
            entity: "term_taxonomy",
            id: root_id,
        })?;
        root.children.reverse();
        Ok(root)
    }

    /// Delete a category and every descendant, pre-order.
    ///
    /// Removes each node's relationship rows, taxonomy entry, term
    /// metadata, and term row. Returns the number of deleted categories.
    pub async fn delete_tree(&self, tree: &CategoryNode) -> Result<u64> {
        let rel_table = self.ns.table(tables::TERM_RELATIONSHIPS);
        let tt_table = self.ns.table(tables::TERM_TAXONOMY);
        let meta_table = self.ns.table(tables::TERM_META);
        let terms_table = self.ns.table(tables::TERMS);

        let mut deleted = 0;
        let mut stack = vec![tree];
        while let Some(node) = stack.pop() {
            self.store
                .delete(
                    &rel_table,
                    &[("term_taxonomy_id", Value::I64(node.term_taxonomy_id))],
                )
                .await?;
            self.store
                .delete(
                    &tt_table,
                    &[("term_taxonomy_id", Value::I64(node.term_taxonomy_id))],
                )
                .await?;
            self.store
                .delete(&meta_table, &[("owner_id", Value::I64(node.term_id))])
                .await?;
            self.store
                .delete(&terms_table, &[("term_id", Value::I64(node.term_id))])
                .await?;
            deleted += 1;

            for child in node.children.iter().rev() {
                stack.push(child);
            }
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Row};

    pub(super) async fn seed_category(
        store: &MemoryStore,
        ns: &str,
        term_id: i64,
        tt_id: i64,
        name: &str,
        parent_id: i64,
    ) {
        store
            .insert(
                &format!("{}terms", ns),
                &Row::new()
                    .with("term_id", term_id)
                    .with("name", name)
                    .with("slug", name.to_lowercase().replace(' ', "-")),
            )
            .await
            .unwrap();
        store
            .insert(
                &format!("{}term_taxonomy", ns),
                &Row::new()
                    .with("term_taxonomy_id", tt_id)
                    .with("term_id", term_id)
                    .with("taxonomy", "category")
                    .with("description", "")
                    .with("parent_id", parent_id)
                    .with("count", 0i64),
            )
            .await
            .unwrap();
    }

    async fn seed_three_level_tree(store: &MemoryStore) {
        // politics(11) -> { elections(12) -> { local(14) }, economy(13) }
        seed_category(store, "", 1, 11, "Politics", 0).await;
        seed_category(store, "", 2, 12, "Elections", 11).await;
        seed_category(store, "", 3, 13, "Economy", 11).await;
        seed_category(store, "", 4, 14, "Local", 12).await;
    }

    #[tokio::test]
    async fn test_materialize_nests_descendants_in_order() {
        let store = Arc::new(MemoryStore::new());
        seed_three_level_tree(&store).await;

        let tree = CategoryTree::new(store, TableNamespace::new(""));
        let root = tree.materialize(11).await.unwrap();

        assert_eq!(root.name, "Politics");
        let names: Vec<&str> = root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Elections", "Economy"]);
        assert_eq!(root.children[0].children[0].name, "Local");
        assert!(root.children[1].children.is_empty());
        assert_eq!(root.size(), 4);
    }

    #[tokio::test]
    async fn test_materialize_missing_root_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let tree = CategoryTree::new(store, TableNamespace::new(""));
        assert!(matches!(
            tree.materialize(404).await.unwrap_err(),
            MigrateError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_delete_tree_spares_siblings() {
        let store = Arc::new(MemoryStore::new());
        seed_three_level_tree(&store).await;
        // A sibling tree next to Politics.
        seed_category(&store, "", 9, 19, "Culture", 0).await;

        let tree = CategoryTree::new(store.clone(), TableNamespace::new(""));
        let root = tree.materialize(11).await.unwrap();
        let deleted = tree.delete_tree(&root).await.unwrap();

        assert_eq!(deleted, 4);
        assert_eq!(store.row_count("terms"), 1);
        assert_eq!(store.row_count("term_taxonomy"), 1);
        let survivor = store
            .select_one("terms", &[("name", Value::from("Culture"))])
            .await
            .unwrap();
        assert!(survivor.is_some());
    }
}
