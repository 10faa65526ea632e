//! Entity graph extraction.

use std::sync::Arc;

use tracing::debug;

use crate::entity::{
    tables, AuthorRow, CommentRow, ItemRow, MetaOwner, MetaRow, TermRelationshipRow, TermRow,
    TermTaxonomyRow,
};
use crate::error::{MigrateError, Result};
use crate::store::{RowStore, TableNamespace, Value};

use super::snapshot::Snapshot;

/// Walks the fixed relationship schema from a root content item and returns
/// everything reachable as one [`Snapshot`].
///
/// All fetches within one call share a single source namespace, which is
/// what lets the same logic read either installation.
pub struct GraphExtractor {
    store: Arc<dyn RowStore>,
}

impl GraphExtractor {
    /// Create an extractor over the given store.
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    /// Extract the entity graph rooted at `root_item_id`.
    ///
    /// Fails with `NotFound` when the root item (or any row it references
    /// with a non-zero id) is absent. Extraction performs no writes.
    pub async fn extract(&self, root_item_id: i64, ns: &TableNamespace) -> Result<Snapshot> {
        let item_row = self
            .store
            .select_one(
                &ns.table(tables::ITEMS),
                &[("item_id", Value::I64(root_item_id))],
            )
            .await?
            .ok_or(MigrateError::NotFound {
                entity: "item",
                id: root_item_id,
            })?;
        let item = ItemRow::from_row(&item_row)?;

        let mut meta = self.fetch_meta(ns, MetaOwner::Item, item.item_id).await?;

        let mut authors = Vec::new();
        if item.author_id > 0 {
            self.fetch_author(ns, item.author_id, &mut authors, &mut meta)
                .await?;
        }

        // The comment fetch is gated on the item's own counter; an item that
        // claims zero comments is taken at its word.
        let mut comments = Vec::new();
        if item.comment_count > 0 {
            let rows = self
                .store
                .select(
                    &ns.table(tables::COMMENTS),
                    &[("item_id", Value::I64(item.item_id))],
                )
                .await?;
            for row in rows {
                let comment = CommentRow::from_row(&row)?;
                meta.extend(
                    self.fetch_meta(ns, MetaOwner::Comment, comment.comment_id)
                        .await?,
                );
                let seen = authors.iter().any(|a: &AuthorRow| a.author_id == comment.author_id);
                if comment.author_id > 0 && !seen {
                    self.fetch_author(ns, comment.author_id, &mut authors, &mut meta)
                        .await?;
                }
                comments.push(comment);
            }
        }

        let rel_rows = self
            .store
            .select(
                &ns.table(tables::TERM_RELATIONSHIPS),
                &[("item_id", Value::I64(item.item_id))],
            )
            .await?;
        let relationships: Vec<TermRelationshipRow> = rel_rows
            .iter()
            .map(TermRelationshipRow::from_row)
            .collect::<Result<_>>()?;

        // One taxonomy row per relationship; terms are shared across
        // taxonomy kinds and deduplicated here, not left for the importer.
        let mut taxonomies: Vec<TermTaxonomyRow> = Vec::with_capacity(relationships.len());
        let mut terms: Vec<TermRow> = Vec::new();
        for rel in &relationships {
            let tt_row = self
                .store
                .select_one(
                    &ns.table(tables::TERM_TAXONOMY),
                    &[("term_taxonomy_id", Value::I64(rel.term_taxonomy_id))],
                )
                .await?
                .ok_or(MigrateError::NotFound {
                    entity: "term_taxonomy",
                    id: rel.term_taxonomy_id,
                })?;
            let taxonomy = TermTaxonomyRow::from_row(&tt_row)?;

            if !terms.iter().any(|t| t.term_id == taxonomy.term_id) {
                let term_row = self
                    .store
                    .select_one(
                        &ns.table(tables::TERMS),
                        &[("term_id", Value::I64(taxonomy.term_id))],
                    )
                    .await?
                    .ok_or(MigrateError::NotFound {
                        entity: "term",
                        id: taxonomy.term_id,
                    })?;
                terms.push(TermRow::from_row(&term_row)?);
            }
            taxonomies.push(taxonomy);
        }

        for term in &terms {
            meta.extend(self.fetch_meta(ns, MetaOwner::Term, term.term_id).await?);
        }

        debug!(
            "Extracted item {}: {} meta, {} authors, {} comments, {} terms, {} taxonomies, {} relationships",
            item.item_id,
            meta.len(),
            authors.len(),
            comments.len(),
            terms.len(),
            taxonomies.len(),
            relationships.len()
        );

        Ok(Snapshot {
            item,
            meta,
            authors,
            comments,
            terms,
            taxonomies,
            relationships,
        })
    }

    async fn fetch_meta(
        &self,
        ns: &TableNamespace,
        owner: MetaOwner,
        owner_id: i64,
    ) -> Result<Vec<MetaRow>> {
        let rows = self
            .store
            .select(
                &ns.table(owner.meta_table()),
                &[("owner_id", Value::I64(owner_id))],
            )
            .await?;
        rows.iter().map(|r| MetaRow::from_row(owner, r)).collect()
    }

    async fn fetch_author(
        &self,
        ns: &TableNamespace,
        author_id: i64,
        authors: &mut Vec<AuthorRow>,
        meta: &mut Vec<MetaRow>,
    ) -> Result<()> {
        let row = self
            .store
            .select_one(
                &ns.table(tables::AUTHORS),
                &[("author_id", Value::I64(author_id))],
            )
            .await?
            .ok_or(MigrateError::NotFound {
                entity: "author",
                id: author_id,
            })?;
        let author = AuthorRow::from_row(&row)?;
        meta.extend(self.fetch_meta(ns, MetaOwner::Author, author.author_id).await?);
        authors.push(author);
        Ok(())
    }
}
