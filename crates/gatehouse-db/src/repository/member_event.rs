//! SurrealDB implementation of [`MemberEventRepository`].

use chrono::{DateTime, Utc};
use gatehouse_core::error::GatehouseResult;
use gatehouse_core::models::member_event::{CreateMemberEvent, MemberEvent};
use gatehouse_core::repository::{MemberEventRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_enum, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct MemberEventRow {
    tenant_id: String,
    target_user_id: String,
    actor_user_id: String,
    event: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct MemberEventRowWithId {
    record_id: String,
    tenant_id: String,
    target_user_id: String,
    actor_user_id: String,
    event: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl MemberEventRow {
    fn into_event(self, id: Uuid) -> Result<MemberEvent, DbError> {
        Ok(MemberEvent {
            id,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            target_user_id: parse_uuid(&self.target_user_id, "target user")?,
            actor_user_id: parse_uuid(&self.actor_user_id, "actor")?,
            event: parse_enum(&self.event, "member event")?,
            metadata: self.metadata,
            created_at: self.created_at,
        })
    }
}

impl MemberEventRowWithId {
    fn try_into_event(self) -> Result<MemberEvent, DbError> {
        let id = parse_uuid(&self.record_id, "member event")?;
        MemberEventRow {
            tenant_id: self.tenant_id,
            target_user_id: self.target_user_id,
            actor_user_id: self.actor_user_id,
            event: self.event,
            metadata: self.metadata,
            created_at: self.created_at,
        }
        .into_event(id)
    }
}

/// SurrealDB implementation of the member event log.
#[derive(Clone)]
pub struct SurrealMemberEventRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealMemberEventRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> MemberEventRepository for SurrealMemberEventRepository<C> {
    async fn append(&self, input: CreateMemberEvent) -> GatehouseResult<MemberEvent> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('member_event', $id) SET \
                 tenant_id = $tenant_id, \
                 target_user_id = $target_user_id, \
                 actor_user_id = $actor_user_id, \
                 event = $event, \
                 metadata = $metadata",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("target_user_id", input.target_user_id.to_string()))
            .bind(("actor_user_id", input.actor_user_id.to_string()))
            .bind(("event", input.event.as_str().to_string()))
            .bind(("metadata", input.metadata))
            .await
            .map_err(DbError::from_statement)?;

        let mut result = result.check().map_err(DbError::from_statement)?;

        let rows: Vec<MemberEventRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "member_event".into(),
            id: id_str,
        })?;

        Ok(row.into_event(id)?)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> GatehouseResult<PaginatedResult<MemberEvent>> {
        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM member_event \
                 WHERE tenant_id = $tenant_id GROUP ALL",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM member_event \
                 WHERE tenant_id = $tenant_id \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MemberEventRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_event())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
