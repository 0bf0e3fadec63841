//! Single-use email-verification and password-reset tokens.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GatehouseError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    EmailVerification,
    PasswordReset,
}

impl TokenPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmailVerification => "EmailVerification",
            Self::PasswordReset => "PasswordReset",
        }
    }
}

impl FromStr for TokenPurpose {
    type Err = GatehouseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "EmailVerification" => Ok(Self::EmailVerification),
            "PasswordReset" => Ok(Self::PasswordReset),
            other => Err(GatehouseError::Validation {
                message: format!("unknown token purpose: {other}"),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecondaryToken {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub purpose: TokenPurpose,
    /// SHA-256 hex of the plaintext token; globally unique.
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SecondaryToken {
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.consumed_at.is_none() && self.expires_at > now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSecondaryToken {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub purpose: TokenPurpose,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}
