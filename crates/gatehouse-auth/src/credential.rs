//! Password verification, the bootstrap administrator path, and
//! password changes.

use chrono::Utc;
use gatehouse_core::error::{GatehouseError, GatehouseResult};
use gatehouse_core::models::tenant::Tenant;
use gatehouse_core::models::user::{CreateUser, MemberRole, UpdateUser, User, UserStatus};
use gatehouse_core::repository::{SessionRepository, UserRepository};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::password;
use crate::token::digest_eq;

#[derive(Debug, Clone)]
pub enum VerifyOutcome {
    Verified(User),
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangePasswordOutcome {
    Changed,
    WrongCurrentPassword,
    SamePassword,
    UserNotFound,
}

/// Verifies and updates password hashes.
#[derive(Clone)]
pub struct CredentialStore<U: UserRepository, S: SessionRepository> {
    users: U,
    sessions: S,
    config: AuthConfig,
}

impl<U: UserRepository, S: SessionRepository> CredentialStore<U, S> {
    pub fn new(users: U, sessions: S, config: AuthConfig) -> Self {
        Self {
            users,
            sessions,
            config,
        }
    }

    pub(crate) fn users(&self) -> &U {
        &self.users
    }

    fn pepper(&self) -> Option<&str> {
        self.config.pepper.as_deref()
    }

    /// Hash a new password with the configured pepper.
    pub fn hash(&self, password: &str) -> GatehouseResult<String> {
        Ok(password::hash_password(password, self.pepper())?)
    }

    fn matches(&self, password: &str, hash: &str) -> GatehouseResult<bool> {
        Ok(password::verify_password(password, hash, self.pepper())?)
    }

    /// Look up `username` exactly within the tenant and check the
    /// password. An unknown username still pays for one Argon2 hash so
    /// response time does not reveal which usernames exist.
    pub async fn verify(
        &self,
        tenant_id: Uuid,
        username: &str,
        password: &str,
    ) -> GatehouseResult<VerifyOutcome> {
        let user = match self.users.get_by_username(tenant_id, username).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => {
                let _ = password::hash_password(password, self.pepper());
                return Ok(VerifyOutcome::Invalid);
            }
            Err(e) => return Err(e),
        };

        if self.matches(password, &user.password_hash)? {
            Ok(VerifyOutcome::Verified(user))
        } else {
            Ok(VerifyOutcome::Invalid)
        }
    }

    /// Create the configured administrator as owner of the default
    /// tenant. Only applies while that tenant has no users at all, and
    /// only when the presented credentials match the configured ones.
    pub async fn bootstrap_admin(
        &self,
        tenant: &Tenant,
        presented_username: &str,
        presented_password: &str,
    ) -> GatehouseResult<Option<User>> {
        let Some((username, admin_password)) = self.config.bootstrap_credentials() else {
            return Ok(None);
        };
        if tenant.slug != self.config.default_tenant_slug {
            return Ok(None);
        }
        if self.users.count(tenant.id).await? != 0 {
            return Ok(None);
        }

        // Evaluate both before branching.
        let username_ok = digest_eq(presented_username, username);
        let password_ok = digest_eq(presented_password, admin_password);
        if !(username_ok & password_ok) {
            return Ok(None);
        }

        let input = CreateUser {
            tenant_id: tenant.id,
            username: username.to_string(),
            email: None,
            password_hash: self.hash(admin_password)?,
            role: MemberRole::Owner,
            status: UserStatus::Active,
            email_verified_at: Some(Utc::now()),
        };
        match self.users.create(input).await {
            Ok(user) => {
                warn!(tenant_id = %tenant.id, user_id = %user.id, "bootstrap administrator created");
                Ok(Some(user))
            }
            // Someone else bootstrapped first.
            Err(e) if e.is_conflict_on("username") => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Replace the user's password. On success every live session of
    /// the user is revoked before returning.
    pub async fn change_password(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> GatehouseResult<ChangePasswordOutcome> {
        let user = match self.users.get_by_id(tenant_id, user_id).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => return Ok(ChangePasswordOutcome::UserNotFound),
            Err(e) => return Err(e),
        };

        if !self.matches(current_password, &user.password_hash)? {
            return Ok(ChangePasswordOutcome::WrongCurrentPassword);
        }
        if digest_eq(current_password, new_password) {
            return Ok(ChangePasswordOutcome::SamePassword);
        }

        let update = UpdateUser {
            password_hash: Some(self.hash(new_password)?),
            ..Default::default()
        };
        match self.users.update(tenant_id, user_id, update).await {
            Ok(_) => {}
            Err(GatehouseError::NotFound { .. }) => return Ok(ChangePasswordOutcome::UserNotFound),
            Err(e) => return Err(e),
        }

        let revoked = self.sessions.revoke_user_sessions(tenant_id, user_id).await?;
        info!(%tenant_id, %user_id, revoked, "password changed, sessions revoked");
        Ok(ChangePasswordOutcome::Changed)
    }
}
