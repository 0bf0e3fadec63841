//! Username/password login for an existing tenant member.

use gatehouse_core::error::GatehouseResult;
use gatehouse_core::models::user::UserStatus;
use gatehouse_core::repository::{SessionRepository, TenantRepository, UserRepository};
use tracing::{debug, info};

use crate::config::AuthConfig;
use crate::credential::{CredentialStore, VerifyOutcome};
use crate::session::{SessionManager, TokenSet};
use crate::tenant_directory::{ResolveOutcome, TenantDirectory};

#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Authenticated(TokenSet),
    /// Unknown tenant, unknown user and wrong password all land here.
    InvalidCredentials,
    PendingApproval,
    Suspended,
    VerificationRequired,
}

pub struct LoginFlow<T: TenantRepository, U: UserRepository, S: SessionRepository> {
    directory: TenantDirectory<T, U>,
    credentials: CredentialStore<U, S>,
    sessions: SessionManager<S, U>,
    require_email_verification: bool,
}

impl<T, U, S> LoginFlow<T, U, S>
where
    T: TenantRepository,
    U: UserRepository,
    S: SessionRepository,
{
    pub fn new(
        directory: TenantDirectory<T, U>,
        credentials: CredentialStore<U, S>,
        sessions: SessionManager<S, U>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            directory,
            credentials,
            sessions,
            require_email_verification: config.require_email_verification,
        }
    }

    /// Verify credentials and start a session. When the tenant is the
    /// empty default tenant, the configured bootstrap administrator is
    /// created on first login.
    pub async fn login(
        &self,
        tenant_slug: &str,
        username: &str,
        password: &str,
    ) -> GatehouseResult<LoginOutcome> {
        let ResolveOutcome::Resolved(tenant) = self.directory.resolve(tenant_slug).await? else {
            return Ok(LoginOutcome::InvalidCredentials);
        };

        let user = match self.credentials.verify(tenant.id, username, password).await? {
            VerifyOutcome::Verified(user) => user,
            VerifyOutcome::Invalid => {
                match self
                    .credentials
                    .bootstrap_admin(&tenant, username, password)
                    .await?
                {
                    Some(admin) => admin,
                    None => {
                        debug!(tenant_id = %tenant.id, "login rejected");
                        return Ok(LoginOutcome::InvalidCredentials);
                    }
                }
            }
        };

        match user.status {
            UserStatus::Active => {}
            UserStatus::PendingApproval => return Ok(LoginOutcome::PendingApproval),
            UserStatus::Suspended => return Ok(LoginOutcome::Suspended),
        }
        if self.require_email_verification && user.email_verified_at.is_none() {
            return Ok(LoginOutcome::VerificationRequired);
        }

        let tokens = self.sessions.issue_tokens(&user).await?;
        info!(tenant_id = %tenant.id, user_id = %user.id, "user logged in");
        Ok(LoginOutcome::Authenticated(tokens))
    }
}
