//! Dedup-aware entity graph import.
//!
//! Consumes a [`Snapshot`], inserts entities in dependency order, records
//! every assigned id in a run-scoped [`RemapTable`], and rewrites every
//! foreign key through it before the row reaches the destination.
//!
//! Error policy is best effort: a single failed insert is logged and
//! counted, and the importer carries on through the remaining relations.
//! Migrations are typically re-run, and partial progress beats losing a
//! whole subgraph over one bad row. Only the root item insert and a remap
//! conflict abort.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::entity::{tables, AuthorRow, MetaOwner, MetaRow, TermRelationshipRow, TermRow};
use crate::error::{MigrateError, Result};
use crate::report::{ImportOutcome, ImportReport};
use crate::store::{Row, RowStore, TableNamespace, Value};

use super::catalog::Catalog;
use super::remap::{RemapKind, RemapTable};
use super::snapshot::Snapshot;

/// Imports snapshots into one destination namespace.
pub struct GraphImporter {
    store: Arc<dyn RowStore>,
    catalog: Catalog,
    local: TableNamespace,
}

impl GraphImporter {
    /// Create an importer writing into the given destination namespace.
    pub fn new(store: Arc<dyn RowStore>, local: TableNamespace) -> Self {
        let catalog = Catalog::new(store.clone(), local.clone());
        Self {
            store,
            catalog,
            local,
        }
    }

    /// Import one snapshot. Returns the per-import report; `item_id` on it
    /// is the destination id assigned to the root item.
    ///
    /// Writes go to the destination only; the snapshot and the source are
    /// never mutated.
    pub async fn import(&self, snapshot: &Snapshot) -> Result<ImportReport> {
        let mut remap = RemapTable::new();
        let mut report = ImportReport::new();

        // Root item first. If this fails there is nothing to hang the rest
        // of the subgraph on, so it aborts.
        let items_table = self.local.table(tables::ITEMS);
        let new_item_id = self
            .store
            .insert(&items_table, &snapshot.item.insert_row())
            .await?;
        remap.put(RemapKind::Item, snapshot.item.item_id, new_item_id)?;
        report.record(
            RemapKind::Item,
            snapshot.item.item_id,
            Some(new_item_id),
            ImportOutcome::Migrated,
        );
        debug!("Item {} inserted as {}", snapshot.item.item_id, new_item_id);

        for meta in snapshot.meta_for(MetaOwner::Item, snapshot.item.item_id) {
            self.insert_meta(meta, new_item_id, &mut report).await;
        }

        // Author resolution may insert rows of its own, so the item's owner
        // reference is fixed up with a second write.
        if snapshot.item.author_id > 0 {
            match snapshot.author(snapshot.item.author_id) {
                Some(author) => {
                    match self
                        .resolve_author(author, snapshot, &mut remap, &mut report)
                        .await
                    {
                        Ok(author_id) => {
                            let set = Row::new().with("author_id", author_id);
                            if let Err(e) = self
                                .store
                                .update(
                                    &items_table,
                                    &set,
                                    &[("item_id", Value::I64(new_item_id))],
                                )
                                .await
                            {
                                warn!("Failed to update item {} author: {}", new_item_id, e);
                                report.record_failure();
                            }
                        }
                        Err(e) if Self::is_fatal(&e) => return Err(e),
                        Err(e) => {
                            warn!(
                                "Failed to resolve author {}: {}",
                                snapshot.item.author_id, e
                            );
                            report.record_failure();
                        }
                    }
                }
                None => {
                    warn!(
                        "{}",
                        MigrateError::UnresolvedReference {
                            kind: "author",
                            old_id: snapshot.item.author_id,
                        }
                    );
                    report.record(
                        RemapKind::Author,
                        snapshot.item.author_id,
                        None,
                        ImportOutcome::Skipped,
                    );
                }
            }
        }

        self.import_comments(snapshot, new_item_id, &mut remap, &mut report)
            .await?;
        self.import_terms(snapshot, &mut remap, &mut report).await?;
        self.import_relationships(snapshot, new_item_id, &remap, &mut report)
            .await;

        report.item_id = new_item_id;
        info!(
            "Imported item {} as {} ({} migrated, {} reused, {} skipped, {} failed)",
            snapshot.item.item_id,
            new_item_id,
            report.migrated,
            report.reused,
            report.skipped,
            report.failed
        );
        Ok(report)
    }

    /// Comments in original order, then a second pass over parent links once
    /// every sibling's new id is known.
    async fn import_comments(
        &self,
        snapshot: &Snapshot,
        new_item_id: i64,
        remap: &mut RemapTable,
        report: &mut ImportReport,
    ) -> Result<()> {
        let comments_table = self.local.table(tables::COMMENTS);

        for comment in &snapshot.comments {
            let author_id = if comment.author_id == 0 {
                0
            } else {
                match snapshot.author(comment.author_id) {
                    Some(author) => match self
                        .resolve_author(author, snapshot, remap, report)
                        .await
                    {
                        Ok(id) => id,
                        Err(e) if Self::is_fatal(&e) => return Err(e),
                        Err(e) => {
                            warn!("Failed to resolve author {}: {}", comment.author_id, e);
                            report.record_failure();
                            0
                        }
                    },
                    None => {
                        warn!(
                            "{}",
                            MigrateError::UnresolvedReference {
                                kind: "author",
                                old_id: comment.author_id,
                            }
                        );
                        report.record(
                            RemapKind::Author,
                            comment.author_id,
                            None,
                            ImportOutcome::Skipped,
                        );
                        0
                    }
                }
            };

            match self
                .store
                .insert(&comments_table, &comment.insert_row(new_item_id, author_id))
                .await
            {
                Ok(new_comment_id) => {
                    remap.put(RemapKind::Comment, comment.comment_id, new_comment_id)?;
                    report.record(
                        RemapKind::Comment,
                        comment.comment_id,
                        Some(new_comment_id),
                        ImportOutcome::Migrated,
                    );
                    for meta in snapshot.meta_for(MetaOwner::Comment, comment.comment_id) {
                        self.insert_meta(meta, new_comment_id, report).await;
                    }
                }
                Err(e) => {
                    warn!("Skipping comment {}: {}", comment.comment_id, e);
                    report.record_failure();
                }
            }
        }

        // Parent rewrite pass. A parent that never made it into the
        // snapshot leaves the comment top-level rather than pointing at a
        // stale id.
        for comment in snapshot.comments.iter().filter(|c| c.parent_id > 0) {
            let Some(new_id) = remap.get(RemapKind::Comment, comment.comment_id) else {
                continue;
            };
            match remap.get(RemapKind::Comment, comment.parent_id) {
                Some(new_parent) => {
                    let set = Row::new().with("parent_id", new_parent);
                    if let Err(e) = self
                        .store
                        .update(
                            &comments_table,
                            &set,
                            &[("comment_id", Value::I64(new_id))],
                        )
                        .await
                    {
                        warn!("Failed to reparent comment {}: {}", new_id, e);
                        report.record_failure();
                    }
                }
                None => {
                    warn!(
                        "{}",
                        MigrateError::UnresolvedReference {
                            kind: "comment",
                            old_id: comment.parent_id,
                        }
                    );
                    report.record(
                        RemapKind::Comment,
                        comment.parent_id,
                        None,
                        ImportOutcome::Skipped,
                    );
                }
            }
        }

        Ok(())
    }

    /// Terms found-or-created by name, then each term's taxonomy entries
    /// resolved against the *resolved* term id. A term shared by several
    /// taxonomy kinds keeps its fan-out: two entries of one snapshot term
    /// may land on one existing destination term.
    async fn import_terms(
        &self,
        snapshot: &Snapshot,
        remap: &mut RemapTable,
        report: &mut ImportReport,
    ) -> Result<()> {
        let tt_table = self.local.table(tables::TERM_TAXONOMY);

        for term in &snapshot.terms {
            let resolved_term_id = match self.resolve_term(term, snapshot, remap, report).await {
                Ok(id) => id,
                Err(e) if Self::is_fatal(&e) => return Err(e),
                Err(e) => {
                    warn!("Skipping term {} ({}): {}", term.term_id, term.name, e);
                    report.record_failure();
                    continue;
                }
            };

            for taxonomy in snapshot.taxonomies_for_term(term.term_id) {
                let existing = match self
                    .catalog
                    .find_taxonomy_entry(resolved_term_id, &taxonomy.taxonomy)
                    .await
                {
                    Ok(existing) => existing,
                    Err(e) => {
                        warn!(
                            "Taxonomy lookup for term {} kind {} failed, treating as absent: {}",
                            resolved_term_id, taxonomy.taxonomy, e
                        );
                        None
                    }
                };

                let new_tt_id = match existing {
                    Some(entry) => {
                        report.record(
                            RemapKind::TermTaxonomy,
                            taxonomy.term_taxonomy_id,
                            Some(entry.term_taxonomy_id),
                            ImportOutcome::Reused,
                        );
                        entry.term_taxonomy_id
                    }
                    None => match self
                        .store
                        .insert(&tt_table, &taxonomy.insert_row(resolved_term_id))
                        .await
                    {
                        Ok(id) => {
                            report.record(
                                RemapKind::TermTaxonomy,
                                taxonomy.term_taxonomy_id,
                                Some(id),
                                ImportOutcome::Migrated,
                            );
                            id
                        }
                        Err(e) => {
                            warn!(
                                "Skipping taxonomy entry {}: {}",
                                taxonomy.term_taxonomy_id, e
                            );
                            report.record_failure();
                            continue;
                        }
                    },
                };
                remap.put(RemapKind::TermTaxonomy, taxonomy.term_taxonomy_id, new_tt_id)?;
            }
        }

        Ok(())
    }

    /// Relationships go last and only through the remap table; an entry
    /// whose taxonomy mapping is missing is skipped and flagged.
    async fn import_relationships(
        &self,
        snapshot: &Snapshot,
        new_item_id: i64,
        remap: &RemapTable,
        report: &mut ImportReport,
    ) {
        let rel_table = self.local.table(tables::TERM_RELATIONSHIPS);

        for rel in &snapshot.relationships {
            match remap.get(RemapKind::TermTaxonomy, rel.term_taxonomy_id) {
                Some(new_tt_id) => {
                    let row = TermRelationshipRow {
                        item_id: new_item_id,
                        term_taxonomy_id: new_tt_id,
                    };
                    match self.store.insert(&rel_table, &row.to_row()).await {
                        Ok(_) => report.record_row(),
                        Err(e) => {
                            warn!(
                                "Failed to attach item {} to taxonomy entry {}: {}",
                                new_item_id, new_tt_id, e
                            );
                            report.record_failure();
                        }
                    }
                }
                None => {
                    warn!(
                        "{}",
                        MigrateError::UnresolvedReference {
                            kind: "term_taxonomy",
                            old_id: rel.term_taxonomy_id,
                        }
                    );
                    report.record(
                        RemapKind::TermTaxonomy,
                        rel.term_taxonomy_id,
                        None,
                        ImportOutcome::Skipped,
                    );
                }
            }
        }
    }

    /// Resolve an author to a destination id: remap table first, then the
    /// destination by login, else insert the author and their metadata.
    async fn resolve_author(
        &self,
        author: &AuthorRow,
        snapshot: &Snapshot,
        remap: &mut RemapTable,
        report: &mut ImportReport,
    ) -> Result<i64> {
        if let Some(id) = remap.get(RemapKind::Author, author.author_id) {
            return Ok(id);
        }

        let new_id = match self.catalog.find_author_by_login(&author.login).await? {
            Some(existing) => {
                debug!(
                    "Author {} already present as {}",
                    author.login, existing.author_id
                );
                report.record(
                    RemapKind::Author,
                    author.author_id,
                    Some(existing.author_id),
                    ImportOutcome::Reused,
                );
                existing.author_id
            }
            None => {
                let id = self
                    .store
                    .insert(&self.local.table(tables::AUTHORS), &author.insert_row())
                    .await?;
                for meta in snapshot.meta_for(MetaOwner::Author, author.author_id) {
                    self.insert_meta(meta, id, report).await;
                }
                report.record(
                    RemapKind::Author,
                    author.author_id,
                    Some(id),
                    ImportOutcome::Migrated,
                );
                id
            }
        };

        remap.put(RemapKind::Author, author.author_id, new_id)?;
        Ok(new_id)
    }

    /// Resolve a term to a destination id by name. The lookup fails open:
    /// worst case a duplicate-named term is created rather than the whole
    /// subtree lost.
    async fn resolve_term(
        &self,
        term: &TermRow,
        snapshot: &Snapshot,
        remap: &mut RemapTable,
        report: &mut ImportReport,
    ) -> Result<i64> {
        let existing = match self.catalog.find_term_by_name(&term.name).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(
                    "Term lookup for {} failed, treating as absent: {}",
                    term.name, e
                );
                None
            }
        };

        let new_id = match existing {
            Some(found) => {
                report.record(
                    RemapKind::Term,
                    term.term_id,
                    Some(found.term_id),
                    ImportOutcome::Reused,
                );
                found.term_id
            }
            None => {
                let id = self
                    .store
                    .insert(&self.local.table(tables::TERMS), &term.insert_row())
                    .await?;
                for meta in snapshot.meta_for(MetaOwner::Term, term.term_id) {
                    self.insert_meta(meta, id, report).await;
                }
                report.record(
                    RemapKind::Term,
                    term.term_id,
                    Some(id),
                    ImportOutcome::Migrated,
                );
                id
            }
        };

        remap.put(RemapKind::Term, term.term_id, new_id)?;
        Ok(new_id)
    }

    /// Insert one metadata row under its rewritten owner id. Failures are
    /// absorbed into the report.
    async fn insert_meta(&self, meta: &MetaRow, new_owner_id: i64, report: &mut ImportReport) {
        let table = self.local.table(meta.owner.meta_table());
        match self.store.insert(&table, &meta.insert_row(new_owner_id)).await {
            Ok(_) => report.record_row(),
            Err(e) => {
                warn!(
                    "Skipping {} row for owner {}: {}",
                    table, new_owner_id, e
                );
                report.record_failure();
            }
        }
    }

    fn is_fatal(err: &MigrateError) -> bool {
        matches!(err, MigrateError::ConflictingRemap { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{CommentRow, ItemRow, TermTaxonomyRow};
    use crate::store::MemoryStore;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 3, 4)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn base_item() -> ItemRow {
        ItemRow {
            item_id: 10,
            item_type: "post".into(),
            status: "publish".into(),
            slug: "hello".into(),
            title: "Hello".into(),
            body: "body".into(),
            author_id: 3,
            comment_count: 2,
            created_at: ts(),
            updated_at: ts(),
        }
    }

    fn jo() -> AuthorRow {
        AuthorRow {
            author_id: 3,
            login: "jo".into(),
            email: "jo@example.com".into(),
            display_name: "Jo".into(),
        }
    }

    fn comment(id: i64, author_id: i64, parent_id: i64) -> CommentRow {
        CommentRow {
            comment_id: id,
            item_id: 10,
            author_id,
            parent_id,
            body: format!("comment {}", id),
            created_at: ts(),
        }
    }

    fn news_term() -> TermRow {
        TermRow {
            term_id: 5,
            name: "News".into(),
            slug: "news".into(),
        }
    }

    fn taxonomy(tt_id: i64, term_id: i64, kind: &str) -> TermTaxonomyRow {
        TermTaxonomyRow {
            term_taxonomy_id: tt_id,
            term_id,
            taxonomy: kind.into(),
            description: String::new(),
            parent_id: 0,
            count: 1,
        }
    }

    fn full_snapshot() -> Snapshot {
        Snapshot {
            item: base_item(),
            meta: vec![MetaRow {
                meta_id: 1,
                owner: MetaOwner::Item,
                owner_id: 10,
                meta_key: "subtitle".into(),
                meta_value: "sub".into(),
            }],
            authors: vec![jo()],
            comments: vec![comment(50, 3, 0), comment(51, 0, 50)],
            terms: vec![news_term()],
            taxonomies: vec![taxonomy(7, 5, "category"), taxonomy(8, 5, "region")],
            relationships: vec![
                TermRelationshipRow {
                    item_id: 10,
                    term_taxonomy_id: 7,
                },
                TermRelationshipRow {
                    item_id: 10,
                    term_taxonomy_id: 8,
                },
            ],
        }
    }

    async fn importer() -> (Arc<MemoryStore>, GraphImporter) {
        let store = Arc::new(MemoryStore::new());
        let importer = GraphImporter::new(store.clone(), TableNamespace::new(""));
        (store, importer)
    }

    #[tokio::test]
    async fn test_import_rewrites_every_foreign_key() {
        let (store, importer) = importer().await;
        let report = importer.import(&full_snapshot()).await.unwrap();

        let new_item_id = report.item_id;
        assert!(new_item_id > 0);

        // The item's author reference was rewritten by the second write.
        let item = store
            .select_one("items", &[("item_id", Value::I64(new_item_id))])
            .await
            .unwrap()
            .unwrap();
        let author_id = item.try_i64("author_id").unwrap();
        let author = store
            .select_one("authors", &[("author_id", Value::I64(author_id))])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(author.try_str("login").unwrap(), "jo");

        // Reply's parent points at the new id of comment 50, not 50.
        let comments = store
            .select("comments", &[("item_id", Value::I64(new_item_id))])
            .await
            .unwrap();
        assert_eq!(comments.len(), 2);
        let first_id = comments[0].try_i64("comment_id").unwrap();
        assert_eq!(comments[1].try_i64("parent_id").unwrap(), first_id);
        assert_ne!(first_id, 50);

        // Relationships were rewritten through the remap table.
        let rels = store
            .select("term_relationships", &[("item_id", Value::I64(new_item_id))])
            .await
            .unwrap();
        assert_eq!(rels.len(), 2);

        assert_eq!(report.failed, 0);
        assert_eq!(report.skipped, 0);
    }

    #[tokio::test]
    async fn test_existing_author_and_term_are_reused() {
        let (store, importer) = importer().await;

        // Pre-seed the destination with the same login and term name.
        store.insert("authors", &jo().insert_row()).await.unwrap();
        store
            .insert("terms", &news_term().insert_row())
            .await
            .unwrap();

        let report = importer.import(&full_snapshot()).await.unwrap();

        assert_eq!(store.row_count("authors"), 1);
        assert_eq!(store.row_count("terms"), 1);
        assert!(report.reused >= 2);
    }

    #[tokio::test]
    async fn test_term_fanout_is_preserved() {
        let (store, importer) = importer().await;
        importer.import(&full_snapshot()).await.unwrap();

        let entries = store.select("term_taxonomy", &[]).await.unwrap();
        assert_eq!(entries.len(), 2);
        let term_ids: Vec<i64> = entries
            .iter()
            .map(|r| r.try_i64("term_id").unwrap())
            .collect();
        // Both taxonomy kinds reference the single resolved term.
        assert_eq!(term_ids[0], term_ids[1]);
        assert_eq!(store.row_count("terms"), 1);
    }

    #[tokio::test]
    async fn test_second_import_grows_only_fanout() {
        let (store, importer) = importer().await;
        importer.import(&full_snapshot()).await.unwrap();
        importer.import(&full_snapshot()).await.unwrap();

        // One author, one term, two taxonomy entries; only items,
        // comments, and relationships doubled.
        assert_eq!(store.row_count("authors"), 1);
        assert_eq!(store.row_count("terms"), 1);
        assert_eq!(store.row_count("term_taxonomy"), 2);
        assert_eq!(store.row_count("items"), 2);
        assert_eq!(store.row_count("term_relationships"), 4);
    }

    #[tokio::test]
    async fn test_dangling_comment_parent_stays_top_level() {
        let (store, importer) = importer().await;

        let mut snap = full_snapshot();
        // Reply to a comment that never made it into the snapshot.
        snap.comments = vec![comment(51, 0, 99)];

        let report = importer.import(&snap).await.unwrap();
        let comments = store.select("comments", &[]).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].try_i64("parent_id").unwrap(), 0);
        assert!(report.skipped >= 1);
    }

    #[tokio::test]
    async fn test_unmapped_relationship_is_skipped_not_stale() {
        let (store, importer) = importer().await;

        let mut snap = full_snapshot();
        // A relationship pointing at a taxonomy entry outside the snapshot.
        snap.relationships.push(TermRelationshipRow {
            item_id: 10,
            term_taxonomy_id: 999,
        });

        let report = importer.import(&snap).await.unwrap();
        let rels = store.select("term_relationships", &[]).await.unwrap();
        // Only the two resolvable relationships were written.
        assert_eq!(rels.len(), 2);
        assert!(rels
            .iter()
            .all(|r| r.try_i64("term_taxonomy_id").unwrap() != 999));
        assert!(report.skipped >= 1);
        assert!(report
            .audit
            .iter()
            .any(|a| a.old_id == 999 && a.outcome == ImportOutcome::Skipped));
    }

    #[tokio::test]
    async fn test_anonymous_comment_author_stays_zero() {
        let (store, importer) = importer().await;

        let mut snap = full_snapshot();
        snap.comments = vec![comment(50, 0, 0)];

        importer.import(&snap).await.unwrap();
        let comments = store.select("comments", &[]).await.unwrap();
        assert_eq!(comments[0].try_i64("author_id").unwrap(), 0);
    }
}
