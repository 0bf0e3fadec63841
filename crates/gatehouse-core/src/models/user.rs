//! User domain model.
//!
//! ```text
//! PendingApproval ──► Active ◄──► Suspended
//! ```
//! Status and role only change through conditional repository writes;
//! [`UpdateUser`] cannot touch them.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GatehouseError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Owner,
    Member,
}

impl MemberRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "Owner",
            Self::Member => "Member",
        }
    }
}

impl FromStr for MemberRole {
    type Err = GatehouseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Owner" => Ok(Self::Owner),
            "Member" => Ok(Self::Member),
            other => Err(GatehouseError::Validation {
                message: format!("unknown member role: {other}"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    PendingApproval,
    Suspended,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::PendingApproval => "PendingApproval",
            Self::Suspended => "Suspended",
        }
    }

    /// The account status transition table.
    pub fn can_transition_to(self, next: UserStatus) -> bool {
        matches!(
            (self, next),
            (Self::PendingApproval, Self::Active)
                | (Self::Active, Self::Suspended)
                | (Self::Suspended, Self::Active)
        )
    }

    pub fn ensure_transition(self, next: UserStatus) -> Result<(), GatehouseError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(GatehouseError::InvalidTransition {
                from: self.as_str().into(),
                to: next.as_str().into(),
            })
        }
    }
}

impl FromStr for UserStatus {
    type Err = GatehouseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Active" => Ok(Self::Active),
            "PendingApproval" => Ok(Self::PendingApproval),
            "Suspended" => Ok(Self::Suspended),
            other => Err(GatehouseError::Validation {
                message: format!("unknown user status: {other}"),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Unique within the tenant, matched exactly.
    pub username: String,
    /// Unique within the tenant, stored lowercased.
    pub email: Option<String>,
    /// Argon2id PHC string.
    pub password_hash: String,
    pub role: MemberRole,
    pub status: UserStatus,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub tenant_id: Uuid,
    pub username: String,
    pub email: Option<String>,
    /// Already-hashed password; repositories never see plaintext.
    pub password_hash: String,
    pub role: MemberRole,
    pub status: UserStatus,
    pub email_verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    pub password_hash: Option<String>,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Public view of a tenant member. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Member {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub role: MemberRole,
    pub status: UserStatus,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for Member {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            tenant_id: user.tenant_id,
            username: user.username,
            email: user.email,
            role: user.role,
            status: user.status,
            email_verified_at: user.email_verified_at,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

/// Canonical form of an email address for storage and comparison.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
