//! Tenant domain model.
//!
//! Tenants provide full data isolation. Every user, invite, session and
//! token belongs to exactly one tenant.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GatehouseError;

/// How new members get into a non-empty tenant.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MembershipPolicy {
    /// A valid invite code is required; the member is active immediately.
    #[default]
    InviteOnly,
    /// A valid invite code is required and the member then waits for
    /// an owner to approve them.
    ApprovalRequired,
}

impl MembershipPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InviteOnly => "InviteOnly",
            Self::ApprovalRequired => "ApprovalRequired",
        }
    }
}

impl FromStr for MembershipPolicy {
    type Err = GatehouseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "InviteOnly" => Ok(Self::InviteOnly),
            "ApprovalRequired" => Ok(Self::ApprovalRequired),
            other => Err(GatehouseError::Validation {
                message: format!("unknown membership policy: {other}"),
            }),
        }
    }
}

/// An isolated customer account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    /// Globally unique, immutable, lowercase URL identifier (e.g. `acme`).
    pub slug: String,
    /// Human-readable name.
    pub name: String,
    pub policy: MembershipPolicy,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a new tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub slug: String,
    pub name: String,
    pub policy: MembershipPolicy,
}

/// Canonical form of a tenant slug: trimmed and lowercased.
pub fn normalize_slug(slug: &str) -> String {
    slug.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_is_trimmed_and_lowercased() {
        assert_eq!(normalize_slug("  Acme-Corp \n"), "acme-corp");
    }

    #[test]
    fn policy_string_roundtrip() {
        for policy in [MembershipPolicy::InviteOnly, MembershipPolicy::ApprovalRequired] {
            assert_eq!(policy.as_str().parse::<MembershipPolicy>().unwrap(), policy);
        }
        assert!("open".parse::<MembershipPolicy>().is_err());
    }
}
