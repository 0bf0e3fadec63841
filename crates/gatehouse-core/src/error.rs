//! Error types for the Gatehouse system.
//!
//! These cover infrastructure faults only. Expected business conditions
//! (taken usernames, bad invite codes, wrong passwords) are returned by
//! value as outcome enums from the service layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatehouseError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// A unique constraint rejected a write. `entity` names the violated
    /// index so callers can tell a taken username from a taken email.
    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatehouseError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatehouseError::NotFound { .. })
    }

    /// True when this is a unique-constraint violation on an index whose
    /// name contains `field` (e.g. `"username"`, `"email"`, `"slug"`).
    pub fn is_conflict_on(&self, field: &str) -> bool {
        matches!(self, GatehouseError::AlreadyExists { entity } if entity.contains(field))
    }
}

pub type GatehouseResult<T> = Result<T, GatehouseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_matches_index_name() {
        let err = GatehouseError::AlreadyExists {
            entity: "idx_user_tenant_email".into(),
        };
        assert!(err.is_conflict_on("email"));
        assert!(!err.is_conflict_on("username"));
        assert!(!err.is_not_found());
    }
}
