//! Destination natural-key lookups.
//!
//! The importer and replanter deduplicate against what already exists at the
//! destination: authors by login, terms by name, taxonomy entries by
//! (term, kind), categories by (name, description, parent). The catalog is
//! explicitly constructed over an injected store, never a process-wide
//! handle, so tests run it against the in-memory store unchanged.

use std::sync::Arc;

use crate::entity::{tables, AuthorRow, TermRow, TermTaxonomyRow, CATEGORY_TAXONOMY};
use crate::error::Result;
use crate::store::{RowStore, TableNamespace, Value};

/// Natural-key lookups over one destination namespace.
pub struct Catalog {
    store: Arc<dyn RowStore>,
    ns: TableNamespace,
}

impl Catalog {
    /// Create a catalog over a destination namespace.
    pub fn new(store: Arc<dyn RowStore>, ns: TableNamespace) -> Self {
        Self { store, ns }
    }

    /// The namespace this catalog resolves against.
    pub fn namespace(&self) -> &TableNamespace {
        &self.ns
    }

    /// Find an author by login name.
    pub async fn find_author_by_login(&self, login: &str) -> Result<Option<AuthorRow>> {
        let row = self
            .store
            .select_one(&self.ns.table(tables::AUTHORS), &[("login", login.into())])
            .await?;
        row.as_ref().map(AuthorRow::from_row).transpose()
    }

    /// Find a term by name.
    pub async fn find_term_by_name(&self, name: &str) -> Result<Option<TermRow>> {
        let row = self
            .store
            .select_one(&self.ns.table(tables::TERMS), &[("name", name.into())])
            .await?;
        row.as_ref().map(TermRow::from_row).transpose()
    }

    /// Find the taxonomy entry attaching a term to a taxonomy kind.
    pub async fn find_taxonomy_entry(
        &self,
        term_id: i64,
        taxonomy: &str,
    ) -> Result<Option<TermTaxonomyRow>> {
        let row = self
            .store
            .select_one(
                &self.ns.table(tables::TERM_TAXONOMY),
                &[("term_id", term_id.into()), ("taxonomy", taxonomy.into())],
            )
            .await?;
        row.as_ref().map(TermTaxonomyRow::from_row).transpose()
    }

    /// Find a category matching (name, description, parent).
    ///
    /// Parent and description narrow the candidate set via the store; the
    /// name check needs the term row, so candidates are resolved one by one.
    pub async fn find_category(
        &self,
        name: &str,
        description: &str,
        parent_id: i64,
    ) -> Result<Option<(TermRow, TermTaxonomyRow)>> {
        let candidates = self
            .store
            .select(
                &self.ns.table(tables::TERM_TAXONOMY),
                &[
                    ("taxonomy", CATEGORY_TAXONOMY.into()),
                    ("parent_id", parent_id.into()),
                    ("description", description.into()),
                ],
            )
            .await?;

        for row in &candidates {
            let taxonomy = TermTaxonomyRow::from_row(row)?;
            let term = self
                .store
                .select_one(
                    &self.ns.table(tables::TERMS),
                    &[("term_id", Value::I64(taxonomy.term_id))],
                )
                .await?;
            if let Some(term) = term {
                let term = TermRow::from_row(&term)?;
                if term.name == name {
                    return Ok(Some((term, taxonomy)));
                }
            }
        }

        Ok(None)
    }

    /// Direct child categories of a category, in store order.
    pub async fn category_children(
        &self,
        parent_id: i64,
    ) -> Result<Vec<(TermRow, TermTaxonomyRow)>> {
        let rows = self
            .store
            .select(
                &self.ns.table(tables::TERM_TAXONOMY),
                &[
                    ("taxonomy", CATEGORY_TAXONOMY.into()),
                    ("parent_id", parent_id.into()),
                ],
            )
            .await?;

        let mut children = Vec::with_capacity(rows.len());
        for row in &rows {
            let taxonomy = TermTaxonomyRow::from_row(row)?;
            let term = self
                .store
                .select_one(
                    &self.ns.table(tables::TERMS),
                    &[("term_id", Value::I64(taxonomy.term_id))],
                )
                .await?;
            if let Some(term) = term {
                children.push((TermRow::from_row(&term)?, taxonomy));
            }
        }

        Ok(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Row};

    async fn seed_category(
        store: &MemoryStore,
        term_id: i64,
        tt_id: i64,
        name: &str,
        parent_id: i64,
    ) {
        store
            .insert(
                "terms",
                &Row::new()
                    .with("term_id", term_id)
                    .with("name", name)
                    .with("slug", name.to_lowercase()),
            )
            .await
            .unwrap();
        store
            .insert(
                "term_taxonomy",
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

    #[tokio::test]
    async fn test_find_author_by_login() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert(
                "authors",
                &Row::new()
                    .with("login", "jo")
                    .with("email", "jo@example.com")
                    .with("display_name", "Jo"),
            )
            .await
            .unwrap();

        let catalog = Catalog::new(store, TableNamespace::new(""));
        let found = catalog.find_author_by_login("jo").await.unwrap().unwrap();
        assert_eq!(found.login, "jo");
        assert!(catalog.find_author_by_login("bo").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_category_requires_name_and_parent() {
        let store = Arc::new(MemoryStore::new());
        seed_category(&store, 1, 11, "News", 0).await;
        seed_category(&store, 2, 12, "Sports", 0).await;

        let catalog = Catalog::new(store, TableNamespace::new(""));
        let (term, taxonomy) = catalog
            .find_category("News", "", 0)
            .await
            .unwrap()
            .expect("category should exist");
        assert_eq!(term.term_id, 1);
        assert_eq!(taxonomy.term_taxonomy_id, 11);

        // Same name under a different parent is a different category.
        assert!(catalog.find_category("News", "", 99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_category_children_in_order() {
        let store = Arc::new(MemoryStore::new());
        seed_category(&store, 1, 11, "Root", 0).await;
        seed_category(&store, 2, 12, "First", 11).await;
        seed_category(&store, 3, 13, "Second", 11).await;

        let catalog = Catalog::new(store, TableNamespace::new(""));
        let children = catalog.category_children(11).await.unwrap();
        let names: Vec<&str> = children.iter().map(|(t, _)| t.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);
    }
}
