//! Self-service mail flows: password-reset requests and verification
//! resends.
//!
//! Both always resolve to a neutral acknowledgement. Whether the tenant
//! or address exists, and whether storage or delivery failed, is only
//! visible in the logs.

use gatehouse_core::error::GatehouseResult;
use gatehouse_core::models::secondary_token::TokenPurpose;
use gatehouse_core::models::user::{User, UserStatus, normalize_email};
use gatehouse_core::repository::{
    SecondaryTokenRepository, SessionRepository, TenantRepository, UserRepository,
};
use tracing::{debug, warn};

use crate::mailer::{Links, Mailer, deliver, password_reset_email, verification_email};
use crate::secondary::SecondaryTokenIssuer;
use crate::tenant_directory::{ResolveOutcome, TenantDirectory};

pub struct AccountRecovery<T, U, K, S, M>
where
    T: TenantRepository,
    U: UserRepository,
    K: SecondaryTokenRepository,
    S: SessionRepository,
    M: Mailer,
{
    directory: TenantDirectory<T, U>,
    users: U,
    issuer: SecondaryTokenIssuer<K, U, S>,
    mailer: M,
    links: Links,
}

impl<T, U, K, S, M> AccountRecovery<T, U, K, S, M>
where
    T: TenantRepository,
    U: UserRepository,
    K: SecondaryTokenRepository,
    S: SessionRepository,
    M: Mailer,
{
    pub fn new(
        directory: TenantDirectory<T, U>,
        users: U,
        issuer: SecondaryTokenIssuer<K, U, S>,
        mailer: M,
        links: Links,
    ) -> Self {
        Self {
            directory,
            users,
            issuer,
            mailer,
            links,
        }
    }

    pub async fn request_password_reset(&self, tenant_slug: &str, email: &str) {
        if let Err(e) = self.try_password_reset(tenant_slug, email).await {
            warn!(tenant = %tenant_slug, error = %e, "password reset request failed");
        }
    }

    pub async fn resend_verification(&self, tenant_slug: &str, email: &str) {
        if let Err(e) = self.try_resend_verification(tenant_slug, email).await {
            warn!(tenant = %tenant_slug, error = %e, "verification resend failed");
        }
    }

    async fn find_user(&self, tenant_slug: &str, email: &str) -> GatehouseResult<Option<User>> {
        let ResolveOutcome::Resolved(tenant) = self.directory.resolve(tenant_slug).await? else {
            return Ok(None);
        };
        match self.users.get_by_email(tenant.id, &normalize_email(email)).await {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn try_password_reset(&self, tenant_slug: &str, email: &str) -> GatehouseResult<()> {
        let Some(user) = self.find_user(tenant_slug, email).await? else {
            debug!(tenant = %tenant_slug, "password reset for unknown address ignored");
            return Ok(());
        };
        let (Some(to), UserStatus::Active) = (user.email.as_deref(), user.status) else {
            return Ok(());
        };

        let issued = self
            .issuer
            .issue(TokenPurpose::PasswordReset, user.tenant_id, user.id)
            .await?;
        let link = self.links.reset_password(&issued.token);
        deliver(&self.mailer, password_reset_email(to, &link)).await;
        Ok(())
    }

    async fn try_resend_verification(&self, tenant_slug: &str, email: &str) -> GatehouseResult<()> {
        let Some(user) = self.find_user(tenant_slug, email).await? else {
            debug!(tenant = %tenant_slug, "verification resend for unknown address ignored");
            return Ok(());
        };
        if user.email_verified_at.is_some() {
            return Ok(());
        }
        let Some(to) = user.email.as_deref() else {
            return Ok(());
        };

        let issued = self
            .issuer
            .issue(TokenPurpose::EmailVerification, user.tenant_id, user.id)
            .await?;
        let link = self.links.verify_email(&issued.token);
        deliver(&self.mailer, verification_email(to, &link)).await;
        Ok(())
    }
}
