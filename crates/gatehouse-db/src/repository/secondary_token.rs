//! SurrealDB implementation of [`SecondaryTokenRepository`].

use chrono::{DateTime, Utc};
use gatehouse_core::error::GatehouseResult;
use gatehouse_core::models::secondary_token::{
    CreateSecondaryToken, SecondaryToken, TokenPurpose,
};
use gatehouse_core::repository::SecondaryTokenRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{parse_enum, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct TokenRow {
    tenant_id: String,
    user_id: String,
    purpose: String,
    token_hash: String,
    expires_at: DateTime<Utc>,
    consumed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct TokenRowWithId {
    record_id: String,
    tenant_id: String,
    user_id: String,
    purpose: String,
    token_hash: String,
    expires_at: DateTime<Utc>,
    consumed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TokenRow {
    fn into_token(self, id: Uuid) -> Result<SecondaryToken, DbError> {
        Ok(SecondaryToken {
            id,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            user_id: parse_uuid(&self.user_id, "user")?,
            purpose: parse_enum(&self.purpose, "token purpose")?,
            token_hash: self.token_hash,
            expires_at: self.expires_at,
            consumed_at: self.consumed_at,
            created_at: self.created_at,
        })
    }
}

impl TokenRowWithId {
    fn try_into_token(self) -> Result<SecondaryToken, DbError> {
        let id = parse_uuid(&self.record_id, "secondary token")?;
        TokenRow {
            tenant_id: self.tenant_id,
            user_id: self.user_id,
            purpose: self.purpose,
            token_hash: self.token_hash,
            expires_at: self.expires_at,
            consumed_at: self.consumed_at,
            created_at: self.created_at,
        }
        .into_token(id)
    }
}

/// SurrealDB implementation of the secondary token repository.
#[derive(Clone)]
pub struct SurrealSecondaryTokenRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSecondaryTokenRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> SecondaryTokenRepository for SurrealSecondaryTokenRepository<C> {
    async fn create(&self, input: CreateSecondaryToken) -> GatehouseResult<SecondaryToken> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('secondary_token', $id) SET \
                 tenant_id = $tenant_id, \
                 user_id = $user_id, \
                 purpose = $purpose, \
                 token_hash = $token_hash, \
                 expires_at = $expires_at",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("purpose", input.purpose.as_str().to_string()))
            .bind(("token_hash", input.token_hash))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from_statement)?;

        let mut result = result.check().map_err(DbError::from_statement)?;

        let rows: Vec<TokenRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "secondary_token".into(),
            id: id_str,
        })?;

        Ok(row.into_token(id)?)
    }

    async fn invalidate_unconsumed(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        purpose: TokenPurpose,
    ) -> GatehouseResult<u64> {
        let result = self
            .db
            .query(
                "DELETE secondary_token \
                 WHERE tenant_id = $tenant_id AND user_id = $user_id \
                 AND purpose = $purpose AND consumed_at = NONE \
                 RETURN BEFORE",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .bind(("purpose", purpose.as_str().to_string()))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from_statement)?;

        let rows: Vec<TokenRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.len() as u64)
    }

    async fn get_by_hash(
        &self,
        purpose: TokenPurpose,
        token_hash: &str,
    ) -> GatehouseResult<SecondaryToken> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM secondary_token \
                 WHERE purpose = $purpose AND token_hash = $token_hash",
            )
            .bind(("purpose", purpose.as_str().to_string()))
            .bind(("token_hash", token_hash.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TokenRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "secondary_token".into(),
            id: "token_hash".into(),
        })?;

        Ok(row.try_into_token()?)
    }

    async fn mark_consumed(&self, tenant_id: Uuid, id: Uuid) -> GatehouseResult<bool> {
        let result = self
            .db
            .query(
                "UPDATE type::record('secondary_token', $id) \
                 SET consumed_at = time::now() \
                 WHERE tenant_id = $tenant_id AND consumed_at = NONE \
                 AND expires_at > time::now()",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from_statement)?;

        let rows: Vec<TokenRow> = result.take(0).map_err(DbError::from)?;
        Ok(!rows.is_empty())
    }
}
