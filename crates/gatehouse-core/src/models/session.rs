//! Session domain model and lifecycle.
//!
//! A session row backs exactly one refresh token. Rotation revokes the
//! row (reason `Rotated`) and mints a new row in the same family, so a
//! family is the whole refresh-token chain of one login.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GatehouseError;

/// Why a session stopped being live.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RevokeReason {
    /// Replaced by a fresh session during refresh.
    Rotated,
    /// Logout, password change, removal, or theft detection.
    Revoked,
}

impl RevokeReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rotated => "Rotated",
            Self::Revoked => "Revoked",
        }
    }
}

impl FromStr for RevokeReason {
    type Err = GatehouseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Rotated" => Ok(Self::Rotated),
            "Revoked" => Ok(Self::Revoked),
            other => Err(GatehouseError::Validation {
                message: format!("unknown revoke reason: {other}"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionState {
    Issued,
    Rotated,
    Revoked,
    Expired,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Issued => "Issued",
            Self::Rotated => "Rotated",
            Self::Revoked => "Revoked",
            Self::Expired => "Expired",
        }
    }

    /// The session transition table. Nothing returns to `Issued`.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (Self::Issued, Self::Rotated)
                | (Self::Issued, Self::Revoked)
                | (Self::Issued, Self::Expired)
        )
    }

    pub fn ensure_transition(self, next: SessionState) -> Result<(), GatehouseError> {
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

impl From<RevokeReason> for SessionState {
    fn from(reason: RevokeReason) -> Self {
        match reason {
            RevokeReason::Rotated => Self::Rotated,
            RevokeReason::Revoked => Self::Revoked,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Doubles as the refresh token's `sid` claim.
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    /// Refresh-token chain this session belongs to.
    pub family_id: Uuid,
    /// SHA-256 hex of the refresh token currently bound to this row.
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoke_reason: Option<RevokeReason>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Lifecycle state at `now`. Revocation wins over expiry.
    pub fn state_at(&self, now: DateTime<Utc>) -> SessionState {
        match (self.revoked_at, self.revoke_reason) {
            (Some(_), Some(reason)) => reason.into(),
            (Some(_), None) => SessionState::Revoked,
            (None, _) if self.expires_at <= now => SessionState::Expired,
            (None, _) => SessionState::Issued,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSession {
    /// Chosen by the caller so it can be embedded in the refresh token
    /// before the row exists.
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub family_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}
