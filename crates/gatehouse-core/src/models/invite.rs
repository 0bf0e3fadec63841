//! Invite domain model and lifecycle.
//!
//! ```text
//! Pending ──► Consumed
//!    │ ├────► Revoked
//!    │ └────► Expired
//! ```
//! Every terminal status is final. The plaintext invite code is never
//! stored; only its SHA-256 hash is.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GatehouseError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    Pending,
    Consumed,
    Revoked,
    Expired,
}

impl InviteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Consumed => "Consumed",
            Self::Revoked => "Revoked",
            Self::Expired => "Expired",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// The invite transition table.
    pub fn can_transition_to(self, next: InviteStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Consumed)
                | (Self::Pending, Self::Revoked)
                | (Self::Pending, Self::Expired)
        )
    }

    /// Check a transition against the table, as an error.
    pub fn ensure_transition(self, next: InviteStatus) -> Result<(), GatehouseError> {
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

impl FromStr for InviteStatus {
    type Err = GatehouseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Pending" => Ok(Self::Pending),
            "Consumed" => Ok(Self::Consumed),
            "Revoked" => Ok(Self::Revoked),
            "Expired" => Ok(Self::Expired),
            other => Err(GatehouseError::Validation {
                message: format!("unknown invite status: {other}"),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invite {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub created_by: Uuid,
    /// SHA-256 hex of the plaintext code.
    #[serde(skip_serializing)]
    pub code_hash: String,
    /// When set, only this (lowercased) address may use the invite.
    pub target_email: Option<String>,
    pub status: InviteStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub consumed_by: Option<Uuid>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Invite {
    /// Pending and not yet past its expiry at `now`.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.status == InviteStatus::Pending && self.expires_at > now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvite {
    pub tenant_id: Uuid,
    pub created_by: Uuid,
    pub code_hash: String,
    pub target_email: Option<String>,
    pub expires_at: DateTime<Utc>,
}
