//! SurrealDB implementation of [`UserRepository`].
//!
//! Passwords arrive already hashed; this layer never sees plaintext.

use chrono::{DateTime, Utc};
use gatehouse_core::error::GatehouseResult;
use gatehouse_core::models::user::{CreateUser, MemberRole, UpdateUser, User, UserStatus};
use gatehouse_core::repository::{PaginatedResult, Pagination, UserRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_enum, parse_uuid};
use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct UserRow {
    tenant_id: String,
    username: String,
    email: Option<String>,
    password_hash: String,
    role: String,
    status: String,
    email_verified_at: Option<DateTime<Utc>>,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct UserRowWithId {
    record_id: String,
    tenant_id: String,
    username: String,
    email: Option<String>,
    password_hash: String,
    role: String,
    status: String,
    email_verified_at: Option<DateTime<Utc>>,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self, id: Uuid) -> Result<User, DbError> {
        Ok(User {
            id,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            role: parse_enum(&self.role, "member role")?,
            status: parse_enum(&self.status, "user status")?,
            email_verified_at: self.email_verified_at,
            last_login_at: self.last_login_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl UserRowWithId {
    fn try_into_user(self) -> Result<User, DbError> {
        let id = parse_uuid(&self.record_id, "user")?;
        UserRow {
            tenant_id: self.tenant_id,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            role: self.role,
            status: self.status,
            email_verified_at: self.email_verified_at,
            last_login_at: self.last_login_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_user(id)
    }
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find_one(
        &self,
        tenant_id: Uuid,
        field: &'static str,
        value: String,
    ) -> GatehouseResult<User> {
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM user \
             WHERE tenant_id = $tenant_id AND {field} = $value"
        );

        let mut result = self
            .db
            .query(query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("value", value.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: format!("{field}={value}"),
        })?;

        Ok(row.try_into_user()?)
    }

    /// `UPDATE` one column, guarded on its current value. Returns the
    /// row only when this statement changed it.
    async fn swap_field(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        field: &'static str,
        from: &'static str,
        to: &'static str,
    ) -> GatehouseResult<Option<User>> {
        let query = format!(
            "UPDATE type::record('user', $id) \
             SET {field} = $to, updated_at = time::now() \
             WHERE tenant_id = $tenant_id AND {field} = $from"
        );

        let result = self
            .db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("from", from.to_string()))
            .bind(("to", to.to_string()))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from_statement)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.into_user(id)?)),
            None => Ok(None),
        }
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> GatehouseResult<User> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('user', $id) SET \
                 tenant_id = $tenant_id, \
                 username = $username, email = $email, \
                 password_hash = $password_hash, \
                 role = $role, status = $status, \
                 email_verified_at = $email_verified_at",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("username", input.username))
            .bind(("email", input.email))
            .bind(("password_hash", input.password_hash))
            .bind(("role", input.role.as_str().to_string()))
            .bind(("status", input.status.as_str().to_string()))
            .bind(("email_verified_at", input.email_verified_at))
            .await
            .map_err(DbError::from_statement)?;

        let mut result = result.check().map_err(DbError::from_statement)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id)?)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> GatehouseResult<User> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('user', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id)?)
    }

    async fn get_by_username(&self, tenant_id: Uuid, username: &str) -> GatehouseResult<User> {
        self.find_one(tenant_id, "username", username.to_string())
            .await
    }

    async fn get_by_email(&self, tenant_id: Uuid, email: &str) -> GatehouseResult<User> {
        self.find_one(tenant_id, "email", email.to_string()).await
    }

    async fn count(&self, tenant_id: Uuid) -> GatehouseResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM user \
                 WHERE tenant_id = $tenant_id GROUP ALL",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    async fn update(&self, tenant_id: Uuid, id: Uuid, input: UpdateUser) -> GatehouseResult<User> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.password_hash.is_some() {
            sets.push("password_hash = $password_hash");
        }
        if input.email_verified_at.is_some() {
            sets.push("email_verified_at = $email_verified_at");
        }
        if input.last_login_at.is_some() {
            sets.push("last_login_at = $last_login_at");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('user', $id) SET {} \
             WHERE tenant_id = $tenant_id",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()));

        if let Some(password_hash) = input.password_hash {
            builder = builder.bind(("password_hash", password_hash));
        }
        if let Some(email_verified_at) = input.email_verified_at {
            builder = builder.bind(("email_verified_at", email_verified_at));
        }
        if let Some(last_login_at) = input.last_login_at {
            builder = builder.bind(("last_login_at", last_login_at));
        }

        let result = builder.await.map_err(DbError::from_statement)?;
        let mut result = result.check().map_err(DbError::from_statement)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id)?)
    }

    async fn transition_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        from: UserStatus,
        to: UserStatus,
    ) -> GatehouseResult<Option<User>> {
        from.ensure_transition(to)?;
        self.swap_field(tenant_id, id, "status", from.as_str(), to.as_str())
            .await
    }

    async fn change_role(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        from: MemberRole,
        to: MemberRole,
    ) -> GatehouseResult<Option<User>> {
        self.swap_field(tenant_id, id, "role", from.as_str(), to.as_str())
            .await
    }

    async fn delete(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        only_if: Option<UserStatus>,
    ) -> GatehouseResult<Option<User>> {
        let query = if only_if.is_some() {
            "DELETE type::record('user', $id) \
             WHERE tenant_id = $tenant_id AND status = $status \
             RETURN BEFORE"
        } else {
            "DELETE type::record('user', $id) \
             WHERE tenant_id = $tenant_id \
             RETURN BEFORE"
        };

        let result = self
            .db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("status", only_if.map(|status| status.as_str().to_string())))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from_statement)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.into_user(id)?)),
            None => Ok(None),
        }
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> GatehouseResult<PaginatedResult<User>> {
        let total = self.count(tenant_id).await?;

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE tenant_id = $tenant_id \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_user())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
