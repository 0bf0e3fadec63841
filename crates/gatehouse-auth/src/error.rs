//! Authentication error types.

use gatehouse_core::error::GatehouseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("expected a {expected} token, got {found}")]
    WrongTokenKind {
        expected: &'static str,
        found: &'static str,
    },

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for GatehouseError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Crypto(msg) => GatehouseError::Crypto(msg),
            AuthError::TokenExpired
            | AuthError::TokenInvalid(_)
            | AuthError::WrongTokenKind { .. } => GatehouseError::Validation {
                message: err.to_string(),
            },
        }
    }
}
