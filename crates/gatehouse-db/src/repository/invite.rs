//! SurrealDB implementation of [`InviteRepository`].
//!
//! Every status change is a single conditional `UPDATE` guarded on
//! `status = 'Pending'`, so two callers racing the same invite cannot
//! both win: the loser's update matches no row.

use chrono::{DateTime, Utc};
use gatehouse_core::error::{GatehouseError, GatehouseResult};
use gatehouse_core::models::invite::{CreateInvite, Invite, InviteStatus};
use gatehouse_core::repository::InviteRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_enum, parse_opt_uuid, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct InviteRow {
    tenant_id: String,
    created_by: String,
    code_hash: String,
    target_email: Option<String>,
    status: String,
    expires_at: DateTime<Utc>,
    consumed_at: Option<DateTime<Utc>>,
    consumed_by: Option<String>,
    revoked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct InviteRowWithId {
    record_id: String,
    tenant_id: String,
    created_by: String,
    code_hash: String,
    target_email: Option<String>,
    status: String,
    expires_at: DateTime<Utc>,
    consumed_at: Option<DateTime<Utc>>,
    consumed_by: Option<String>,
    revoked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl InviteRow {
    fn into_invite(self, id: Uuid) -> Result<Invite, DbError> {
        Ok(Invite {
            id,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            created_by: parse_uuid(&self.created_by, "creator")?,
            code_hash: self.code_hash,
            target_email: self.target_email,
            status: parse_enum(&self.status, "invite status")?,
            created_at: self.created_at,
            expires_at: self.expires_at,
            consumed_at: self.consumed_at,
            consumed_by: parse_opt_uuid(self.consumed_by.as_deref(), "consumer")?,
            revoked_at: self.revoked_at,
        })
    }
}

impl InviteRowWithId {
    fn try_into_invite(self) -> Result<Invite, DbError> {
        let id = parse_uuid(&self.record_id, "invite")?;
        InviteRow {
            tenant_id: self.tenant_id,
            created_by: self.created_by,
            code_hash: self.code_hash,
            target_email: self.target_email,
            status: self.status,
            expires_at: self.expires_at,
            consumed_at: self.consumed_at,
            consumed_by: self.consumed_by,
            revoked_at: self.revoked_at,
            created_at: self.created_at,
        }
        .into_invite(id)
    }
}

/// SurrealDB implementation of the Invite repository.
#[derive(Clone)]
pub struct SurrealInviteRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealInviteRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> InviteRepository for SurrealInviteRepository<C> {
    async fn create(&self, input: CreateInvite) -> GatehouseResult<Invite> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('invite', $id) SET \
                 tenant_id = $tenant_id, \
                 created_by = $created_by, \
                 code_hash = $code_hash, \
                 target_email = $target_email, \
                 status = 'Pending', \
                 expires_at = $expires_at",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("created_by", input.created_by.to_string()))
            .bind(("code_hash", input.code_hash))
            .bind(("target_email", input.target_email))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from_statement)?;

        let mut result = result.check().map_err(DbError::from_statement)?;

        let rows: Vec<InviteRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "invite".into(),
            id: id_str,
        })?;

        Ok(row.into_invite(id)?)
    }

    async fn get_by_code_hash(&self, tenant_id: Uuid, code_hash: &str) -> GatehouseResult<Invite> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM invite \
                 WHERE tenant_id = $tenant_id AND code_hash = $code_hash",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("code_hash", code_hash.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<InviteRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "invite".into(),
            id: "code_hash".into(),
        })?;

        Ok(row.try_into_invite()?)
    }

    async fn expire_stale(&self, tenant_id: Uuid) -> GatehouseResult<u64> {
        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM invite \
                 WHERE tenant_id = $tenant_id AND status = 'Pending' \
                 AND expires_at <= time::now() GROUP ALL",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);
        if total == 0 {
            return Ok(0);
        }

        self.db
            .query(
                "UPDATE invite SET status = 'Expired' \
                 WHERE tenant_id = $tenant_id AND status = 'Pending' \
                 AND expires_at <= time::now()",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;

        Ok(total)
    }

    async fn transition(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        to: InviteStatus,
        consumed_by: Option<Uuid>,
    ) -> GatehouseResult<Option<Invite>> {
        InviteStatus::Pending.ensure_transition(to)?;

        let (sets, expiry_guard) = match to {
            InviteStatus::Consumed => (
                "status = 'Consumed', consumed_at = time::now(), consumed_by = $consumed_by",
                "expires_at > time::now()",
            ),
            InviteStatus::Revoked => (
                "status = 'Revoked', revoked_at = time::now()",
                "expires_at > time::now()",
            ),
            // Only `Expired` is left once the table check passed.
            _ => ("status = 'Expired'", "expires_at <= time::now()"),
        };

        let consumed_by = match (to, consumed_by) {
            (InviteStatus::Consumed, None) => {
                return Err(GatehouseError::Validation {
                    message: "consuming an invite requires the consuming user".into(),
                });
            }
            (InviteStatus::Consumed, Some(user_id)) => Some(user_id.to_string()),
            _ => None,
        };

        let query = format!(
            "UPDATE type::record('invite', $id) SET {sets} \
             WHERE tenant_id = $tenant_id AND status = 'Pending' AND {expiry_guard}"
        );

        let result = self
            .db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("consumed_by", consumed_by))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from_statement)?;

        let rows: Vec<InviteRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.into_invite(id)?)),
            None => Ok(None),
        }
    }

    async fn list_recent(&self, tenant_id: Uuid, limit: u64) -> GatehouseResult<Vec<Invite>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM invite \
                 WHERE tenant_id = $tenant_id \
                 ORDER BY created_at DESC \
                 LIMIT $limit",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("limit", limit))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<InviteRowWithId> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| row.try_into_invite())
            .collect::<Result<Vec<_>, DbError>>()?)
    }
}
