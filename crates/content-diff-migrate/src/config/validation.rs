//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Database validation
    if config.database.host.is_empty() {
        return Err(MigrateError::Config("database.host is required".into()));
    }
    if config.database.database.is_empty() {
        return Err(MigrateError::Config("database.database is required".into()));
    }
    if config.database.user.is_empty() {
        return Err(MigrateError::Config("database.user is required".into()));
    }
    if config.database.port == 0 {
        return Err(MigrateError::Config(
            "database.port must be non-zero".into(),
        ));
    }

    // The two namespaces must not collide, or the diff would compare an
    // installation against itself and every import would write into its
    // own source.
    if config.source.prefix == config.local.prefix {
        return Err(MigrateError::Config(
            "source and local table prefixes must differ".into(),
        ));
    }

    if config.migration.item_types.is_empty() {
        return Err(MigrateError::Config(
            "migration.item_types must name at least one type".into(),
        ));
    }
    if config.migration.item_types.iter().any(|t| t.is_empty()) {
        return Err(MigrateError::Config(
            "migration.item_types must not contain empty names".into(),
        ));
    }

    Ok(())
}
