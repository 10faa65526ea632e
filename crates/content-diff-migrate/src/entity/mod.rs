//! Typed rows for the fixed content schema.
//!
//! The relationship graph walked by the extractor/importer is fixed, so each
//! entity kind gets a concrete struct plus conversions to and from the
//! dynamic [`Row`] shape the store adapter speaks. Metadata is a single
//! polymorphic type: one row shape shared by items, comments, authors, and
//! terms, with [`MetaOwner`] selecting the physical table.

use chrono::NaiveDateTime;

use crate::error::Result;
use crate::store::{Row, Value};

/// The taxonomy kind that forms hierarchical category trees.
pub const CATEGORY_TAXONOMY: &str = "category";

/// Base table names, qualified through a [`crate::store::TableNamespace`].
pub mod tables {
    pub const ITEMS: &str = "items";
    pub const ITEM_META: &str = "item_meta";
    pub const AUTHORS: &str = "authors";
    pub const AUTHOR_META: &str = "author_meta";
    pub const COMMENTS: &str = "comments";
    pub const COMMENT_META: &str = "comment_meta";
    pub const TERMS: &str = "terms";
    pub const TERM_META: &str = "term_meta";
    pub const TERM_TAXONOMY: &str = "term_taxonomy";
    pub const TERM_RELATIONSHIPS: &str = "term_relationships";
}

/// Auto-assigned primary key column per base table.
///
/// `term_relationships` is keyed by (item_id, term_taxonomy_id) and has no
/// auto-assigned column, so it is absent here.
const AUTO_PK: &[(&str, &str)] = &[
    (tables::ITEMS, "item_id"),
    (tables::ITEM_META, "meta_id"),
    (tables::AUTHORS, "author_id"),
    (tables::AUTHOR_META, "meta_id"),
    (tables::COMMENTS, "comment_id"),
    (tables::COMMENT_META, "meta_id"),
    (tables::TERMS, "term_id"),
    (tables::TERM_META, "meta_id"),
    (tables::TERM_TAXONOMY, "term_taxonomy_id"),
];

/// Resolve the auto-assigned primary key column for a (possibly prefixed)
/// table name, e.g. `live_items` → `item_id`.
pub fn auto_pk_column(table: &str) -> Option<&'static str> {
    AUTO_PK
        .iter()
        .find(|(base, _)| {
            table == *base
                || (table.ends_with(base)
                    && table.as_bytes().get(table.len() - base.len() - 1) == Some(&b'_'))
        })
        .map(|(_, pk)| *pk)
}

/// A content item (the root of every extracted subgraph).
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRow {
    pub item_id: i64,
    pub item_type: String,
    pub status: String,
    pub slug: String,
    pub title: String,
    pub body: String,
    pub author_id: i64,
    pub comment_count: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ItemRow {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            item_id: row.try_i64("item_id")?,
            item_type: row.try_str("item_type")?.to_string(),
            status: row.try_str("status")?.to_string(),
            slug: row.try_str("slug")?.to_string(),
            title: row.try_str("title")?.to_string(),
            body: row.try_str("body")?.to_string(),
            author_id: row.try_i64("author_id")?,
            comment_count: row.try_i64("comment_count")?,
            created_at: row.try_datetime("created_at")?,
            updated_at: row.try_datetime("updated_at")?,
        })
    }

    pub fn to_row(&self) -> Row {
        Row::new()
            .with("item_id", self.item_id)
            .with("item_type", self.item_type.clone())
            .with("status", self.status.clone())
            .with("slug", self.slug.clone())
            .with("title", self.title.clone())
            .with("body", self.body.clone())
            .with("author_id", self.author_id)
            .with("comment_count", self.comment_count)
            .with("created_at", self.created_at)
            .with("updated_at", self.updated_at)
    }

    /// Row for insertion at the destination: the source key is dropped so
    /// the destination assigns its own.
    pub fn insert_row(&self) -> Row {
        let mut row = self.to_row();
        row.remove("item_id");
        row
    }
}

/// Which entity a metadata row hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaOwner {
    Item,
    Comment,
    Author,
    Term,
}

impl MetaOwner {
    /// The base table holding this owner's metadata rows.
    pub fn meta_table(self) -> &'static str {
        match self {
            MetaOwner::Item => tables::ITEM_META,
            MetaOwner::Comment => tables::COMMENT_META,
            MetaOwner::Author => tables::AUTHOR_META,
            MetaOwner::Term => tables::TERM_META,
        }
    }
}

/// One metadata row, polymorphic over its owner kind.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaRow {
    pub meta_id: i64,
    pub owner: MetaOwner,
    pub owner_id: i64,
    pub meta_key: String,
    pub meta_value: String,
}

impl MetaRow {
    pub fn from_row(owner: MetaOwner, row: &Row) -> Result<Self> {
        Ok(Self {
            meta_id: row.try_i64("meta_id")?,
            owner,
            owner_id: row.try_i64("owner_id")?,
            meta_key: row.try_str("meta_key")?.to_string(),
            meta_value: row.try_str("meta_value")?.to_string(),
        })
    }

    pub fn to_row(&self) -> Row {
        Row::new()
            .with("meta_id", self.meta_id)
            .with("owner_id", self.owner_id)
            .with("meta_key", self.meta_key.clone())
            .with("meta_value", self.meta_value.clone())
    }

    /// Row for insertion with the owner reference rewritten to the
    /// destination id.
    pub fn insert_row(&self, new_owner_id: i64) -> Row {
        Row::new()
            .with("owner_id", new_owner_id)
            .with("meta_key", self.meta_key.clone())
            .with("meta_value", self.meta_value.clone())
    }
}

/// An author (user) row. `login` is the natural key used for dedup.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorRow {
    pub author_id: i64,
    pub login: String,
    pub email: String,
    pub display_name: String,
}

impl AuthorRow {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            author_id: row.try_i64("author_id")?,
            login: row.try_str("login")?.to_string(),
            email: row.try_str("email")?.to_string(),
            display_name: row.try_str("display_name")?.to_string(),
        })
    }

    pub fn to_row(&self) -> Row {
        Row::new()
            .with("author_id", self.author_id)
            .with("login", self.login.clone())
            .with("email", self.email.clone())
            .with("display_name", self.display_name.clone())
    }

    pub fn insert_row(&self) -> Row {
        let mut row = self.to_row();
        row.remove("author_id");
        row
    }
}

/// A comment. `author_id` of 0 means anonymous; `parent_id` of 0 means
/// top-level.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentRow {
    pub comment_id: i64,
    pub item_id: i64,
    pub author_id: i64,
    pub parent_id: i64,
    pub body: String,
    pub created_at: NaiveDateTime,
}

impl CommentRow {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            comment_id: row.try_i64("comment_id")?,
            item_id: row.try_i64("item_id")?,
            author_id: row.try_i64("author_id")?,
            parent_id: row.try_i64("parent_id")?,
            body: row.try_str("body")?.to_string(),
            created_at: row.try_datetime("created_at")?,
        })
    }

    pub fn to_row(&self) -> Row {
        Row::new()
            .with("comment_id", self.comment_id)
            .with("item_id", self.item_id)
            .with("author_id", self.author_id)
            .with("parent_id", self.parent_id)
            .with("body", self.body.clone())
            .with("created_at", self.created_at)
    }

    /// Row for insertion with item and author references rewritten. The
    /// parent reference is left at 0 here; a second pass rewrites it once
    /// every sibling's new id is known.
    pub fn insert_row(&self, new_item_id: i64, new_author_id: i64) -> Row {
        Row::new()
            .with("item_id", new_item_id)
            .with("author_id", new_author_id)
            .with("parent_id", 0i64)
            .with("body", self.body.clone())
            .with("created_at", self.created_at)
    }
}

/// A vocabulary term. `name` is the natural key used for dedup.
#[derive(Debug, Clone, PartialEq)]
pub struct TermRow {
    pub term_id: i64,
    pub name: String,
    pub slug: String,
}

impl TermRow {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            term_id: row.try_i64("term_id")?,
            name: row.try_str("name")?.to_string(),
            slug: row.try_str("slug")?.to_string(),
        })
    }

    pub fn to_row(&self) -> Row {
        Row::new()
            .with("term_id", self.term_id)
            .with("name", self.name.clone())
            .with("slug", self.slug.clone())
    }

    pub fn insert_row(&self) -> Row {
        let mut row = self.to_row();
        row.remove("term_id");
        row
    }
}

/// A term's attachment to one taxonomy kind. One term may carry several of
/// these (e.g. "News" in both "category" and "region").
#[derive(Debug, Clone, PartialEq)]
pub struct TermTaxonomyRow {
    pub term_taxonomy_id: i64,
    pub term_id: i64,
    pub taxonomy: String,
    pub description: String,
    pub parent_id: i64,
    pub count: i64,
}

impl TermTaxonomyRow {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            term_taxonomy_id: row.try_i64("term_taxonomy_id")?,
            term_id: row.try_i64("term_id")?,
            taxonomy: row.try_str("taxonomy")?.to_string(),
            description: row.try_str("description")?.to_string(),
            parent_id: row.try_i64("parent_id")?,
            count: row.try_i64("count")?,
        })
    }

    pub fn to_row(&self) -> Row {
        Row::new()
            .with("term_taxonomy_id", self.term_taxonomy_id)
            .with("term_id", self.term_id)
            .with("taxonomy", self.taxonomy.clone())
            .with("description", self.description.clone())
            .with("parent_id", self.parent_id)
            .with("count", self.count)
    }

    /// Row for insertion with the term reference rewritten.
    pub fn insert_row(&self, new_term_id: i64) -> Row {
        let mut row = self.to_row();
        row.remove("term_taxonomy_id");
        row.set("term_id", new_term_id);
        row
    }
}

/// Attachment of a content item to a taxonomy entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TermRelationshipRow {
    pub item_id: i64,
    pub term_taxonomy_id: i64,
}

impl TermRelationshipRow {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            item_id: row.try_i64("item_id")?,
            term_taxonomy_id: row.try_i64("term_taxonomy_id")?,
        })
    }

    pub fn to_row(&self) -> Row {
        Row::new()
            .with("item_id", self.item_id)
            .with("term_taxonomy_id", self.term_taxonomy_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 6, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_auto_pk_column_with_prefix() {
        assert_eq!(auto_pk_column("items"), Some("item_id"));
        assert_eq!(auto_pk_column("live_items"), Some("item_id"));
        assert_eq!(auto_pk_column("live_term_taxonomy"), Some("term_taxonomy_id"));
        assert_eq!(auto_pk_column("live_term_relationships"), None);
        // A prefix must end at an underscore boundary.
        assert_eq!(auto_pk_column("bitems"), None);
    }

    #[test]
    fn test_item_row_round_trip() {
        let item = ItemRow {
            item_id: 10,
            item_type: "post".into(),
            status: "publish".into(),
            slug: "hello-world".into(),
            title: "Hello World".into(),
            body: "Lorem ipsum.".into(),
            author_id: 3,
            comment_count: 2,
            created_at: ts(),
            updated_at: ts(),
        };

        let decoded = ItemRow::from_row(&item.to_row()).unwrap();
        assert_eq!(decoded, item);

        let insert = item.insert_row();
        assert!(insert.get("item_id").is_none());
        assert_eq!(insert.try_i64("author_id").unwrap(), 3);
    }

    #[test]
    fn test_comment_insert_row_rewrites_references() {
        let comment = CommentRow {
            comment_id: 51,
            item_id: 10,
            author_id: 4,
            parent_id: 50,
            body: "reply".into(),
            created_at: ts(),
        };

        let row = comment.insert_row(500, 40);
        assert_eq!(row.try_i64("item_id").unwrap(), 500);
        assert_eq!(row.try_i64("author_id").unwrap(), 40);
        // Parent is rewritten by a later pass, not at insert time.
        assert_eq!(row.try_i64("parent_id").unwrap(), 0);
        assert!(row.get("comment_id").is_none());
    }

    #[test]
    fn test_meta_owner_tables() {
        assert_eq!(MetaOwner::Item.meta_table(), tables::ITEM_META);
        assert_eq!(MetaOwner::Term.meta_table(), tables::TERM_META);
    }

    #[test]
    fn test_meta_insert_row_rewrites_owner() {
        let meta = MetaRow {
            meta_id: 9,
            owner: MetaOwner::Item,
            owner_id: 10,
            meta_key: "subtitle".into(),
            meta_value: "A subtitle".into(),
        };

        let row = meta.insert_row(500);
        assert_eq!(row.try_i64("owner_id").unwrap(), 500);
        assert!(row.get("meta_id").is_none());
    }
}
