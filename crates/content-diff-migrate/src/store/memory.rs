//! In-memory row store for tests and dry runs.
//!
//! Behaves like the MySQL adapter for the subset of behavior the migration
//! core relies on: equality-filtered selects, auto-assigned primary keys on
//! insert, and affected-row counts on update/delete. Seeding a fixture works
//! through the same [`RowStore`] interface: an inserted row that already
//! carries its primary key keeps it.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::entity;
use crate::error::Result;

use super::{Row, RowStore, Value};

#[derive(Debug, Default)]
struct TableData {
    rows: Vec<Row>,
    next_id: i64,
}

/// In-memory [`RowStore`] implementation.
///
/// Tables are created on first touch. Interior mutability keeps the store
/// usable behind the same shared reference shape as the pooled adapter.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, TableData>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(row: &Row, filters: &[(&str, Value)]) -> bool {
        filters.iter().all(|(col, val)| row.get(col) == Some(val))
    }

    /// Total row count of a table (absent tables count as empty).
    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn select(&self, table: &str, filters: &[(&str, Value)]) -> Result<Vec<Row>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .get(table)
            .map(|t| {
                t.rows
                    .iter()
                    .filter(|row| Self::matches(row, filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn select_one(&self, table: &str, filters: &[(&str, Value)]) -> Result<Option<Row>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.get(table).and_then(|t| {
            t.rows
                .iter()
                .find(|row| Self::matches(row, filters))
                .cloned()
        }))
    }

    async fn insert(&self, table: &str, row: &Row) -> Result<i64> {
        let mut tables = self.tables.lock().unwrap();
        let data = tables.entry(table.to_string()).or_default();

        let mut row = row.clone();
        let id = match entity::auto_pk_column(table) {
            Some(pk) => match row.get(pk) {
                // Seeded row: honor the caller's key, keep the sequence ahead.
                Some(Value::I64(id)) if *id > 0 => {
                    let id = *id;
                    data.next_id = data.next_id.max(id + 1);
                    id
                }
                _ => {
                    let id = data.next_id.max(1);
                    data.next_id = id + 1;
                    row.set(pk, id);
                    id
                }
            },
            None => 0,
        };

        data.rows.push(row);
        Ok(id)
    }

    async fn update(&self, table: &str, set: &Row, filters: &[(&str, Value)]) -> Result<u64> {
        let mut tables = self.tables.lock().unwrap();
        let Some(data) = tables.get_mut(table) else {
            return Ok(0);
        };

        let mut affected = 0;
        for row in data.rows.iter_mut() {
            if Self::matches(row, filters) {
                for (col, val) in set.iter() {
                    row.set(col, val.clone());
                }
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn delete(&self, table: &str, filters: &[(&str, Value)]) -> Result<u64> {
        let mut tables = self.tables.lock().unwrap();
        let Some(data) = tables.get_mut(table) else {
            return Ok(0);
        };

        let before = data.rows.len();
        data.rows.retain(|row| !Self::matches(row, filters));
        Ok((before - data.rows.len()) as u64)
    }
}
