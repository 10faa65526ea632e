//! Configuration type definitions.

use serde::{Deserialize, Serialize};

use crate::store::TableNamespace;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database server holding both installations.
    pub database: DatabaseConfig,

    /// Source ("live") table namespace.
    pub source: NamespaceConfig,

    /// Destination ("local") table namespace.
    pub local: NamespaceConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// MySQL server configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,
}

// Keeps credentials out of logs and error chains.
impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// One installation's table namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceConfig {
    /// Table prefix, e.g. "live_wp_". May be empty.
    pub prefix: String,
}

impl NamespaceConfig {
    /// Build the namespace handle used by the engine.
    pub fn namespace(&self) -> TableNamespace {
        TableNamespace::new(self.prefix.clone())
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Content item types included in the live-vs-local diff.
    #[serde(default = "default_item_types")]
    pub item_types: Vec<String>,

    /// Recompute taxonomy counts after the import pass (default: true).
    #[serde(default = "default_true")]
    pub repair_counts: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            item_types: default_item_types(),
            repair_counts: true,
        }
    }
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_item_types() -> Vec<String> {
    vec!["post".to_string(), "page".to_string()]
}

fn default_true() -> bool {
    true
}
