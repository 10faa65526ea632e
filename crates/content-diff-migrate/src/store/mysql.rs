//! MySQL row store implementation.
//!
//! Implements the [`RowStore`] trait over a sqlx connection pool. SQL text
//! only ever contains quoted identifiers and `?` placeholders; every value
//! reaches the server as a bound parameter.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{
    MySqlArguments, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow, MySqlSslMode,
};
use sqlx::{Column as _, Row as _, TypeInfo as _, ValueRef as _};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::{MigrateError, Result};

use super::{Row, RowStore, Value};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default pool size. The engine issues store calls sequentially, so a small
/// pool is plenty.
const DEFAULT_MAX_CONNECTIONS: usize = 4;

type Query<'q> = sqlx::query::Query<'q, sqlx::MySql, MySqlArguments>;

/// MySQL-backed [`RowStore`].
pub struct MysqlStore {
    pool: MySqlPool,
}

impl MysqlStore {
    /// Create a new store from configuration with the default pool size.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        Self::with_max_connections(config, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Create a new store with an explicit pool size.
    pub async fn with_max_connections(config: &DatabaseConfig, max_conns: usize) -> Result<Self> {
        // Default to Preferred SSL mode
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(MySqlSslMode::Preferred);

        let pool = MySqlPoolOptions::new()
            .max_connections(max_conns as u32)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await?;

        // Test connection
        sqlx::query("SELECT 1").fetch_one(&pool).await?;

        info!(
            "Connected to MySQL: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self { pool })
    }

    /// Test the database connection.
    pub async fn test_connection(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    /// Quote a MySQL identifier.
    fn quote_ident(name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    /// Build a `WHERE a = ? AND b = ?` clause for the given filters, or an
    /// empty string when there are none.
    fn where_clause(filters: &[(&str, Value)]) -> String {
        if filters.is_empty() {
            return String::new();
        }
        let predicates: Vec<String> = filters
            .iter()
            .map(|(col, _)| format!("{} = ?", Self::quote_ident(col)))
            .collect();
        format!(" WHERE {}", predicates.join(" AND "))
    }

    fn bind_value<'q>(query: Query<'q>, value: &'q Value) -> Query<'q> {
        match value {
            Value::Null => query.bind(Option::<String>::None),
            Value::I64(v) => query.bind(*v),
            Value::F64(v) => query.bind(*v),
            Value::Text(s) => query.bind(s.as_str()),
            Value::DateTime(dt) => query.bind(*dt),
        }
    }

    fn bind_filters<'q>(mut query: Query<'q>, filters: &'q [(&str, Value)]) -> Query<'q> {
        for (_, value) in filters {
            query = Self::bind_value(query, value);
        }
        query
    }

    /// Convert a MySQL row into the dynamic row shape.
    fn decode_row(row: &MySqlRow) -> Row {
        let mut out = Row::new();
        for (idx, col) in row.columns().iter().enumerate() {
            let type_name = col.type_info().name().to_string();
            out.set(col.name(), Self::decode_value(row, idx, &type_name));
        }
        out
    }

    /// Decode one column by its MySQL type name, widening integers to i64.
    fn decode_value(row: &MySqlRow, idx: usize, type_name: &str) -> Value {
        let is_null: bool = row.try_get_raw(idx).map(|v| v.is_null()).unwrap_or(true);
        if is_null {
            return Value::Null;
        }

        match type_name {
            "BOOLEAN" => row
                .try_get::<bool, _>(idx)
                .map(|v| Value::I64(i64::from(v)))
                .unwrap_or(Value::Null),
            "TINYINT" => row
                .try_get::<i8, _>(idx)
                .map(|v| Value::I64(i64::from(v)))
                .unwrap_or(Value::Null),
            "SMALLINT" => row
                .try_get::<i16, _>(idx)
                .map(|v| Value::I64(i64::from(v)))
                .unwrap_or(Value::Null),
            "MEDIUMINT" | "INT" => row
                .try_get::<i32, _>(idx)
                .map(|v| Value::I64(i64::from(v)))
                .unwrap_or(Value::Null),
            "BIGINT" => row
                .try_get::<i64, _>(idx)
                .map(Value::I64)
                .unwrap_or(Value::Null),
            "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
            | "BIGINT UNSIGNED" => row
                .try_get::<u64, _>(idx)
                .map(|v| Value::I64(v as i64))
                .unwrap_or(Value::Null),
            "FLOAT" => row
                .try_get::<f32, _>(idx)
                .map(|v| Value::F64(f64::from(v)))
                .unwrap_or(Value::Null),
            "DOUBLE" => row
                .try_get::<f64, _>(idx)
                .map(Value::F64)
                .unwrap_or(Value::Null),
            "DATETIME" | "TIMESTAMP" => row
                .try_get::<chrono::NaiveDateTime, _>(idx)
                .map(Value::DateTime)
                .unwrap_or(Value::Null),
            // CHAR/VARCHAR/TEXT/ENUM and anything else: fall back to string
            _ => row
                .try_get::<String, _>(idx)
                .map(Value::Text)
                .unwrap_or(Value::Null),
        }
    }
}

#[async_trait]
impl RowStore for MysqlStore {
    async fn select(&self, table: &str, filters: &[(&str, Value)]) -> Result<Vec<Row>> {
        let sql = format!(
            "SELECT * FROM {}{}",
            Self::quote_ident(table),
            Self::where_clause(filters)
        );

        let query = Self::bind_filters(sqlx::query(&sql), filters);
        let rows = query.fetch_all(&self.pool).await?;

        Ok(rows.iter().map(Self::decode_row).collect())
    }

    async fn select_one(&self, table: &str, filters: &[(&str, Value)]) -> Result<Option<Row>> {
        let sql = format!(
            "SELECT * FROM {}{} LIMIT 1",
            Self::quote_ident(table),
            Self::where_clause(filters)
        );

        let query = Self::bind_filters(sqlx::query(&sql), filters);
        let row = query.fetch_optional(&self.pool).await?;

        Ok(row.as_ref().map(Self::decode_row))
    }

    async fn insert(&self, table: &str, row: &Row) -> Result<i64> {
        let columns: Vec<&str> = row.iter().map(|(col, _)| col).collect();
        let column_list: Vec<String> = columns.iter().map(|c| Self::quote_ident(c)).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            Self::quote_ident(table),
            column_list.join(", "),
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for (_, value) in row.iter() {
            query = Self::bind_value(query, value);
        }

        let result = query.execute(&self.pool).await?;
        if result.rows_affected() != 1 {
            return Err(MigrateError::insert_failed(
                table,
                format!("insert affected {} rows", result.rows_affected()),
            ));
        }

        Ok(result.last_insert_id() as i64)
    }

    async fn update(&self, table: &str, set: &Row, filters: &[(&str, Value)]) -> Result<u64> {
        let assignments: Vec<String> = set
            .iter()
            .map(|(col, _)| format!("{} = ?", Self::quote_ident(col)))
            .collect();

        let sql = format!(
            "UPDATE {} SET {}{}",
            Self::quote_ident(table),
            assignments.join(", "),
            Self::where_clause(filters)
        );

        let mut query = sqlx::query(&sql);
        for (_, value) in set.iter() {
            query = Self::bind_value(query, value);
        }
        query = Self::bind_filters(query, filters);

        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, table: &str, filters: &[(&str, Value)]) -> Result<u64> {
        let sql = format!(
            "DELETE FROM {}{}",
            Self::quote_ident(table),
            Self::where_clause(filters)
        );

        let query = Self::bind_filters(sqlx::query(&sql), filters);
        let result = query.execute(&self.pool).await?;

        Ok(result.rows_affected())
    }
}
