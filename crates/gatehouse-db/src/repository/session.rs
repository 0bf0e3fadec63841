//! SurrealDB implementation of [`SessionRepository`].

use chrono::{DateTime, Utc};
use gatehouse_core::error::GatehouseResult;
use gatehouse_core::models::session::{CreateSession, RevokeReason, Session};
use gatehouse_core::repository::SessionRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_enum, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct SessionRow {
    tenant_id: String,
    user_id: String,
    family_id: String,
    token_hash: String,
    expires_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    revoke_reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_session(self, id: Uuid) -> Result<Session, DbError> {
        Ok(Session {
            id,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            user_id: parse_uuid(&self.user_id, "user")?,
            family_id: parse_uuid(&self.family_id, "session family")?,
            token_hash: self.token_hash,
            expires_at: self.expires_at,
            last_seen_at: self.last_seen_at,
            revoked_at: self.revoked_at,
            revoke_reason: self
                .revoke_reason
                .as_deref()
                .map(|r| parse_enum(r, "revoke reason"))
                .transpose()?,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the Session repository.
#[derive(Clone)]
pub struct SurrealSessionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSessionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Stamp `revoked_at` on every live session matching `field`.
    async fn revoke_where(
        &self,
        tenant_id: Uuid,
        field: &'static str,
        value: Uuid,
    ) -> GatehouseResult<u64> {
        let query = format!(
            "UPDATE session SET \
             revoked_at = time::now(), revoke_reason = 'Revoked' \
             WHERE tenant_id = $tenant_id AND {field} = $value \
             AND revoked_at = NONE"
        );

        let result = self
            .db
            .query(query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("value", value.to_string()))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from_statement)?;

        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.len() as u64)
    }
}

impl<C: Connection> SessionRepository for SurrealSessionRepository<C> {
    async fn create(&self, input: CreateSession) -> GatehouseResult<Session> {
        let id_str = input.id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('session', $id) SET \
                 tenant_id = $tenant_id, \
                 user_id = $user_id, \
                 family_id = $family_id, \
                 token_hash = $token_hash, \
                 expires_at = $expires_at",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("family_id", input.family_id.to_string()))
            .bind(("token_hash", input.token_hash))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from_statement)?;

        let mut result = result.check().map_err(DbError::from_statement)?;

        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "session".into(),
            id: id_str,
        })?;

        Ok(row.into_session(input.id)?)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> GatehouseResult<Session> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('session', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "session".into(),
            id: id_str,
        })?;

        Ok(row.into_session(id)?)
    }

    async fn revoke(&self, tenant_id: Uuid, id: Uuid, reason: RevokeReason) -> GatehouseResult<bool> {
        let result = self
            .db
            .query(
                "UPDATE type::record('session', $id) SET \
                 revoked_at = time::now(), revoke_reason = $reason \
                 WHERE tenant_id = $tenant_id AND revoked_at = NONE",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("reason", reason.as_str().to_string()))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from_statement)?;

        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        Ok(!rows.is_empty())
    }

    async fn revoke_family(&self, tenant_id: Uuid, family_id: Uuid) -> GatehouseResult<u64> {
        self.revoke_where(tenant_id, "family_id", family_id).await
    }

    async fn revoke_user_sessions(&self, tenant_id: Uuid, user_id: Uuid) -> GatehouseResult<u64> {
        self.revoke_where(tenant_id, "user_id", user_id).await
    }

    async fn cleanup_expired(&self, tenant_id: Uuid) -> GatehouseResult<u64> {
        // Count expired sessions first, then delete.
        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM session \
                 WHERE tenant_id = $tenant_id AND expires_at < time::now() \
                 GROUP ALL",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        self.db
            .query("DELETE session WHERE tenant_id = $tenant_id AND expires_at < time::now()")
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;

        Ok(total)
    }
}
