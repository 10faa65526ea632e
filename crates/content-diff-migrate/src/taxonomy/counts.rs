//! Aggregate count repair.
//!
//! `term_taxonomy.count` is a derived aggregate and is never trusted after
//! bulk relationship writes; this recomputes it from the authoritative
//! relationship rows.

use tracing::{debug, info};

use crate::entity::{tables, TermTaxonomyRow};
use crate::error::Result;
use crate::store::{Row, RowStore, TableNamespace, Value};

/// Recompute the materialized relationship count of every taxonomy entry
/// under `taxonomy`, zero-object entries included.
///
/// Only drifted counts are written back. Returns how many were repaired.
pub async fn recount_taxonomy(
    store: &dyn RowStore,
    ns: &TableNamespace,
    taxonomy: &str,
) -> Result<u64> {
    let tt_table = ns.table(tables::TERM_TAXONOMY);
    let rel_table = ns.table(tables::TERM_RELATIONSHIPS);

    let rows = store
        .select(&tt_table, &[("taxonomy", taxonomy.into())])
        .await?;

    let mut repaired = 0;
    for row in &rows {
        let entry = TermTaxonomyRow::from_row(row)?;
        let actual = store
            .select(
                &rel_table,
                &[("term_taxonomy_id", Value::I64(entry.term_taxonomy_id))],
            )
            .await?
            .len() as i64;

        if actual != entry.count {
            store
                .update(
                    &tt_table,
                    &Row::new().with("count", actual),
                    &[("term_taxonomy_id", Value::I64(entry.term_taxonomy_id))],
                )
                .await?;
            debug!(
                "Entry {}: count {} -> {}",
                entry.term_taxonomy_id, entry.count, actual
            );
            repaired += 1;
        }
    }

    info!(
        "Recounted {} {} entries, {} repaired",
        rows.len(),
        taxonomy,
        repaired
    );
    Ok(repaired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    async fn seed_entry(store: &MemoryStore, tt_id: i64, kind: &str, count: i64) {
        store
            .insert(
                "term_taxonomy",
                &Row::new()
                    .with("term_taxonomy_id", tt_id)
                    .with("term_id", tt_id)
                    .with("taxonomy", kind)
                    .with("description", "")
                    .with("parent_id", 0i64)
                    .with("count", count),
            )
            .await
            .unwrap();
    }

    async fn relate(store: &MemoryStore, item_id: i64, tt_id: i64) {
        store
            .insert(
                "term_relationships",
                &Row::new()
                    .with("item_id", item_id)
                    .with("term_taxonomy_id", tt_id),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_recount_repairs_drifted_and_zero_counts() {
        let store = MemoryStore::new();
        let ns = TableNamespace::new("");

        seed_entry(&store, 11, "category", 9).await; // drifted high
        seed_entry(&store, 12, "category", 0).await; // drifted low
        seed_entry(&store, 13, "category", 1).await; // already correct
        relate(&store, 100, 11).await;
        relate(&store, 100, 12).await;
        relate(&store, 101, 12).await;
        relate(&store, 101, 13).await;

        let repaired = recount_taxonomy(&store, &ns, "category").await.unwrap();
        assert_eq!(repaired, 2);

        for (tt_id, expected) in [(11i64, 1i64), (12, 2), (13, 1)] {
            let row = store
                .select_one("term_taxonomy", &[("term_taxonomy_id", Value::I64(tt_id))])
                .await
                .unwrap()
                .unwrap();
            assert_eq!(row.try_i64("count").unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_recount_is_scoped_to_one_taxonomy_kind() {
        let store = MemoryStore::new();
        let ns = TableNamespace::new("");

        seed_entry(&store, 11, "category", 5).await;
        seed_entry(&store, 12, "region", 5).await;

        let repaired = recount_taxonomy(&store, &ns, "category").await.unwrap();
        assert_eq!(repaired, 1);

        // The other kind's count is untouched.
        let region = store
            .select_one("term_taxonomy", &[("term_taxonomy_id", Value::I64(12))])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(region.try_i64("count").unwrap(), 5);
    }

    #[tokio::test]
    async fn test_recount_of_empty_kind_is_noop() {
        let store = MemoryStore::new();
        let ns = TableNamespace::new("");
        let repaired = recount_taxonomy(&store, &ns, "category").await.unwrap();
        assert_eq!(repaired, 0);
    }
}
