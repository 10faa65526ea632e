//! Immutable in-memory capture of one extracted entity graph.

use crate::entity::{
    AuthorRow, CommentRow, ItemRow, MetaOwner, MetaRow, TermRelationshipRow, TermRow,
    TermTaxonomyRow,
};

/// One extracted entity graph, grouped by entity kind.
///
/// Created fresh per extraction, treated as immutable once returned, and
/// discarded after one import pass. Within a kind group no entity appears
/// twice (author and term dedup happens during extraction). All identifiers
/// are source-namespace ids; nothing here is rewritten.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// The root content item.
    pub item: ItemRow,

    /// Metadata of every captured entity, tagged by owner kind.
    pub meta: Vec<MetaRow>,

    /// The item's author plus every distinct comment author.
    pub authors: Vec<AuthorRow>,

    /// Comments on the item, in source order.
    pub comments: Vec<CommentRow>,

    /// Distinct terms referenced through the item's relationships.
    pub terms: Vec<TermRow>,

    /// Taxonomy entries referenced by the item, one per relationship.
    pub taxonomies: Vec<TermTaxonomyRow>,

    /// The item's term relationships.
    pub relationships: Vec<TermRelationshipRow>,
}

impl Snapshot {
    /// Metadata rows belonging to one owner.
    pub fn meta_for(&self, owner: MetaOwner, owner_id: i64) -> impl Iterator<Item = &MetaRow> {
        self.meta
            .iter()
            .filter(move |m| m.owner == owner && m.owner_id == owner_id)
    }

    /// Look up a captured author by source id.
    pub fn author(&self, author_id: i64) -> Option<&AuthorRow> {
        self.authors.iter().find(|a| a.author_id == author_id)
    }

    /// Taxonomy entries attached to one term.
    pub fn taxonomies_for_term(&self, term_id: i64) -> impl Iterator<Item = &TermTaxonomyRow> {
        self.taxonomies.iter().filter(move |t| t.term_id == term_id)
    }
}
