//! Membership audit trail (append-only).

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GatehouseError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MemberEventKind {
    Approved,
    Rejected,
    Removed,
    RoleChanged,
}

impl MemberEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Removed => "Removed",
            Self::RoleChanged => "RoleChanged",
        }
    }
}

impl FromStr for MemberEventKind {
    type Err = GatehouseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Approved" => Ok(Self::Approved),
            "Rejected" => Ok(Self::Rejected),
            "Removed" => Ok(Self::Removed),
            "RoleChanged" => Ok(Self::RoleChanged),
            other => Err(GatehouseError::Validation {
                message: format!("unknown member event: {other}"),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberEvent {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub target_user_id: Uuid,
    pub actor_user_id: Uuid,
    pub event: MemberEventKind,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMemberEvent {
    pub tenant_id: Uuid,
    pub target_user_id: Uuid,
    pub actor_user_id: Uuid,
    pub event: MemberEventKind,
    pub metadata: serde_json::Value,
}
