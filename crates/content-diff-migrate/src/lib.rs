//! # content-diff-migrate
//!
//! Entity-graph content migration between two installations of the same
//! relational CMS schema (a "live" source and a "local" destination, usually
//! two table prefixes inside one MySQL server).
//!
//! The library closes over every row transitively related to a root content
//! item, transplants that subgraph into the destination namespace, and keeps
//! referential integrity intact while doing so:
//!
//! - **Graph extraction** into an immutable in-memory snapshot
//! - **Identity remapping** of every primary and foreign key
//! - **Dedup-aware import** (authors by login, terms by name)
//! - **Taxonomy tree replanting** for self-referential category trees
//! - **Aggregate count repair** after bulk relationship rewrites
//!
//! ## Example
//!
//! ```rust,no_run
//! use content_diff_migrate::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> content_diff_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.run().await?;
//!     println!("Imported {} items", result.items_imported);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod graph;
pub mod orchestrator;
pub mod report;
pub mod store;
pub mod taxonomy;

// Re-exports for convenient access
pub use config::{Config, DatabaseConfig, MigrationConfig, NamespaceConfig};
pub use error::{MigrateError, Result};
pub use graph::{Catalog, GraphExtractor, GraphImporter, RemapKind, RemapTable, Snapshot};
pub use orchestrator::{MigrationResult, Orchestrator};
pub use report::{AuditEntry, ImportOutcome, ImportReport};
pub use store::{MemoryStore, MysqlStore, Row, RowStore, TableNamespace, Value};
pub use taxonomy::{recount_taxonomy, CategoryNode, CategoryTree, Replanter, ReplantStats};
