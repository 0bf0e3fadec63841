//! SurrealDB implementation of [`TenantRepository`].

use chrono::{DateTime, Utc};
use gatehouse_core::error::GatehouseResult;
use gatehouse_core::models::tenant::{CreateTenant, Tenant};
use gatehouse_core::repository::{PaginatedResult, Pagination, TenantRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_enum, parse_uuid};
use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct TenantRow {
    slug: String,
    name: String,
    policy: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TenantRow {
    fn into_tenant(self, id: Uuid) -> Result<Tenant, DbError> {
        Ok(Tenant {
            id,
            slug: self.slug,
            name: self.name,
            policy: parse_enum(&self.policy, "membership policy")?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct TenantRowWithId {
    record_id: String,
    slug: String,
    name: String,
    policy: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TenantRowWithId {
    fn try_into_tenant(self) -> Result<Tenant, DbError> {
        let id = parse_uuid(&self.record_id, "tenant")?;
        TenantRow {
            slug: self.slug,
            name: self.name,
            policy: self.policy,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_tenant(id)
    }
}

/// SurrealDB implementation of the Tenant repository.
#[derive(Clone)]
pub struct SurrealTenantRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTenantRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> TenantRepository for SurrealTenantRepository<C> {
    async fn create(&self, input: CreateTenant) -> GatehouseResult<Tenant> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('tenant', $id) SET \
                 slug = $slug, name = $name, policy = $policy",
            )
            .bind(("id", id_str.clone()))
            .bind(("slug", input.slug))
            .bind(("name", input.name))
            .bind(("policy", input.policy.as_str().to_string()))
            .await
            .map_err(DbError::from_statement)?;

        let mut result = result.check().map_err(DbError::from_statement)?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: id_str,
        })?;

        Ok(row.into_tenant(id)?)
    }

    async fn get_by_slug(&self, slug: &str) -> GatehouseResult<Tenant> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM tenant WHERE slug = $slug",
            )
            .bind(("slug", slug.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: format!("slug={slug}"),
        })?;

        Ok(row.try_into_tenant()?)
    }

    async fn delete(&self, id: Uuid) -> GatehouseResult<()> {
        self.db
            .query("DELETE type::record('tenant', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from_statement)?;

        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> GatehouseResult<PaginatedResult<Tenant>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM tenant GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM tenant \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_tenant())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
