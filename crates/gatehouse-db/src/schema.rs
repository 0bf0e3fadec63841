//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode. UUIDs are stored as
//! strings. Enums are stored as strings with ASSERT constraints.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "accounts",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Tenants (global scope)
-- =======================================================================
DEFINE TABLE tenant SCHEMAFULL;
DEFINE FIELD slug ON TABLE tenant TYPE string;
DEFINE FIELD name ON TABLE tenant TYPE string;
DEFINE FIELD policy ON TABLE tenant TYPE string \
    ASSERT $value IN ['InviteOnly', 'ApprovalRequired'];
DEFINE FIELD created_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_tenant_slug ON TABLE tenant COLUMNS slug UNIQUE;

-- =======================================================================
-- Users (tenant scope)
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE user TYPE string;
DEFINE FIELD username ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE option<string>;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD role ON TABLE user TYPE string \
    ASSERT $value IN ['Owner', 'Member'];
DEFINE FIELD status ON TABLE user TYPE string \
    ASSERT $value IN ['Active', 'PendingApproval', 'Suspended'];
DEFINE FIELD email_verified_at ON TABLE user TYPE option<datetime>;
DEFINE FIELD last_login_at ON TABLE user TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_tenant_username ON TABLE user \
    COLUMNS tenant_id, username UNIQUE;
DEFINE INDEX idx_user_tenant_email ON TABLE user \
    COLUMNS tenant_id, email UNIQUE;

-- =======================================================================
-- Sessions (tenant scope)
-- =======================================================================
DEFINE TABLE session SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE session TYPE string;
DEFINE FIELD user_id ON TABLE session TYPE string;
DEFINE FIELD family_id ON TABLE session TYPE string;
DEFINE FIELD token_hash ON TABLE session TYPE string;
DEFINE FIELD expires_at ON TABLE session TYPE datetime;
DEFINE FIELD last_seen_at ON TABLE session TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD revoked_at ON TABLE session TYPE option<datetime>;
DEFINE FIELD revoke_reason ON TABLE session TYPE option<string> \
    ASSERT $value = NONE OR $value IN ['Rotated', 'Revoked'];
DEFINE FIELD created_at ON TABLE session TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_session_user ON TABLE session \
    COLUMNS tenant_id, user_id;
DEFINE INDEX idx_session_family ON TABLE session \
    COLUMNS tenant_id, family_id;

-- =======================================================================
-- Invites (tenant scope)
-- =======================================================================
DEFINE TABLE invite SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE invite TYPE string;
DEFINE FIELD created_by ON TABLE invite TYPE string;
DEFINE FIELD code_hash ON TABLE invite TYPE string;
DEFINE FIELD target_email ON TABLE invite TYPE option<string>;
DEFINE FIELD status ON TABLE invite TYPE string \
    ASSERT $value IN ['Pending', 'Consumed', 'Revoked', 'Expired'];
DEFINE FIELD expires_at ON TABLE invite TYPE datetime;
DEFINE FIELD consumed_at ON TABLE invite TYPE option<datetime>;
DEFINE FIELD consumed_by ON TABLE invite TYPE option<string>;
DEFINE FIELD revoked_at ON TABLE invite TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE invite TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_invite_tenant_code ON TABLE invite \
    COLUMNS tenant_id, code_hash UNIQUE;
DEFINE INDEX idx_invite_tenant_status ON TABLE invite \
    COLUMNS tenant_id, status;

-- =======================================================================
-- Secondary tokens: email verification / password reset
-- =======================================================================
DEFINE TABLE secondary_token SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE secondary_token TYPE string;
DEFINE FIELD user_id ON TABLE secondary_token TYPE string;
DEFINE FIELD purpose ON TABLE secondary_token TYPE string \
    ASSERT $value IN ['EmailVerification', 'PasswordReset'];
DEFINE FIELD token_hash ON TABLE secondary_token TYPE string;
DEFINE FIELD expires_at ON TABLE secondary_token TYPE datetime;
DEFINE FIELD consumed_at ON TABLE secondary_token TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE secondary_token TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_secondary_token_hash ON TABLE secondary_token \
    COLUMNS token_hash UNIQUE;
DEFINE INDEX idx_secondary_token_user ON TABLE secondary_token \
    COLUMNS tenant_id, user_id, purpose;

-- =======================================================================
-- Member events (tenant scope, append-only)
-- =======================================================================
DEFINE TABLE member_event SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD tenant_id ON TABLE member_event TYPE string;
DEFINE FIELD target_user_id ON TABLE member_event TYPE string;
DEFINE FIELD actor_user_id ON TABLE member_event TYPE string;
DEFINE FIELD event ON TABLE member_event TYPE string \
    ASSERT $value IN ['Approved', 'Rejected', 'Removed', 'RoleChanged'];
DEFINE FIELD metadata ON TABLE member_event TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD created_at ON TABLE member_event TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_member_event_tenant_time ON TABLE member_event \
    COLUMNS tenant_id, created_at;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

        info!(version = migration.version, "Migration applied");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }

    #[test]
    fn every_table_is_schemafull() {
        for table in ["tenant", "user", "session", "invite", "secondary_token", "member_event"] {
            assert!(
                SCHEMA_V1.contains(&format!("DEFINE TABLE {table} SCHEMAFULL")),
                "{table} missing"
            );
        }
    }
}
