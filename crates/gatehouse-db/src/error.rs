//! Database-specific error types and conversions.

use gatehouse_core::error::GatehouseError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Corrupt row: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Unique index violated: {index}")]
    Conflict { index: String },
}

impl DbError {
    /// Classify a failed statement. Unique-index violations become
    /// [`DbError::Conflict`] carrying the index name; everything else
    /// is a plain query failure.
    pub(crate) fn from_statement(err: surrealdb::Error) -> Self {
        let message = err.to_string();
        match conflict_index(&message) {
            Some(index) => DbError::Conflict { index },
            None => DbError::Query(message),
        }
    }
}

/// Extract the index name from a SurrealDB unique violation message such
/// as ``Database index `idx_user_tenant_email` already contains ...``.
fn conflict_index(message: &str) -> Option<String> {
    if !message.contains("already contains") {
        return None;
    }
    let name = message
        .find("index `")
        .map(|start| &message[start + "index `".len()..])
        .and_then(|rest| rest.find('`').map(|end| rest[..end].to_string()));
    Some(name.unwrap_or_else(|| message.to_string()))
}

impl From<DbError> for GatehouseError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => GatehouseError::NotFound { entity, id },
            DbError::Conflict { index } => GatehouseError::AlreadyExists { entity: index },
            other => GatehouseError::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_names_the_index() {
        let msg = "Database index `idx_user_tenant_username` already contains \
                   ['t1', 'alice'], with record `user:abc`";
        assert_eq!(
            conflict_index(msg).as_deref(),
            Some("idx_user_tenant_username")
        );
    }

    #[test]
    fn other_errors_are_not_conflicts() {
        assert_eq!(conflict_index("Parse error: unexpected token"), None);
    }

    #[test]
    fn conflict_maps_to_already_exists() {
        let err: GatehouseError = DbError::Conflict {
            index: "idx_tenant_slug".into(),
        }
        .into();
        assert!(err.is_conflict_on("slug"));
    }
}
