//! Single-use email-verification and password-reset tokens.

use chrono::{DateTime, Duration, Utc};
use gatehouse_core::error::GatehouseResult;
use gatehouse_core::models::secondary_token::{CreateSecondaryToken, SecondaryToken, TokenPurpose};
use gatehouse_core::models::user::{Member, UpdateUser};
use gatehouse_core::repository::{SecondaryTokenRepository, SessionRepository, UserRepository};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::password;
use crate::token::{generate_opaque_token, hash_token};

/// Plaintext token returned to the caller once; only its hash is kept.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum ConsumeOutcome {
    Consumed(SecondaryToken),
    InvalidOrExpired,
}

#[derive(Debug, Clone)]
pub enum VerifyEmailOutcome {
    Verified(Member),
    InvalidOrExpired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetPasswordOutcome {
    Reset,
    InvalidOrExpired,
}

#[derive(Clone)]
pub struct SecondaryTokenIssuer<K, U, S>
where
    K: SecondaryTokenRepository,
    U: UserRepository,
    S: SessionRepository,
{
    tokens: K,
    users: U,
    sessions: S,
    config: AuthConfig,
}

impl<K, U, S> SecondaryTokenIssuer<K, U, S>
where
    K: SecondaryTokenRepository,
    U: UserRepository,
    S: SessionRepository,
{
    pub fn new(tokens: K, users: U, sessions: S, config: AuthConfig) -> Self {
        Self {
            tokens,
            users,
            sessions,
            config,
        }
    }

    fn lifetime(&self, purpose: TokenPurpose) -> Duration {
        let secs = match purpose {
            TokenPurpose::EmailVerification => self.config.email_verification_lifetime_secs,
            TokenPurpose::PasswordReset => self.config.password_reset_lifetime_secs,
        };
        Duration::seconds(secs as i64)
    }

    /// Issue a new token, invalidating any unconsumed one of the same
    /// purpose for the user.
    pub async fn issue(
        &self,
        purpose: TokenPurpose,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> GatehouseResult<IssuedToken> {
        let dropped = self
            .tokens
            .invalidate_unconsumed(tenant_id, user_id, purpose)
            .await?;

        let token = generate_opaque_token();
        let expires_at = Utc::now() + self.lifetime(purpose);
        self.tokens
            .create(CreateSecondaryToken {
                tenant_id,
                user_id,
                purpose,
                token_hash: hash_token(&token),
                expires_at,
            })
            .await?;

        debug!(%tenant_id, %user_id, purpose = purpose.as_str(), dropped, "secondary token issued");
        Ok(IssuedToken { token, expires_at })
    }

    /// Spend a token. Succeeds at most once per token.
    pub async fn consume(&self, purpose: TokenPurpose, token: &str) -> GatehouseResult<ConsumeOutcome> {
        let row = match self.tokens.get_by_hash(purpose, &hash_token(token)).await {
            Ok(row) => row,
            Err(e) if e.is_not_found() => return Ok(ConsumeOutcome::InvalidOrExpired),
            Err(e) => return Err(e),
        };
        if !row.is_usable_at(Utc::now()) {
            return Ok(ConsumeOutcome::InvalidOrExpired);
        }
        if !self.tokens.mark_consumed(row.tenant_id, row.id).await? {
            return Ok(ConsumeOutcome::InvalidOrExpired);
        }
        Ok(ConsumeOutcome::Consumed(row))
    }

    pub async fn verify_email(&self, token: &str) -> GatehouseResult<VerifyEmailOutcome> {
        let ConsumeOutcome::Consumed(row) =
            self.consume(TokenPurpose::EmailVerification, token).await?
        else {
            return Ok(VerifyEmailOutcome::InvalidOrExpired);
        };

        let update = UpdateUser {
            email_verified_at: Some(Utc::now()),
            ..Default::default()
        };
        match self.users.update(row.tenant_id, row.user_id, update).await {
            Ok(user) => {
                info!(tenant_id = %row.tenant_id, user_id = %row.user_id, "email verified");
                Ok(VerifyEmailOutcome::Verified(user.into()))
            }
            Err(e) if e.is_not_found() => Ok(VerifyEmailOutcome::InvalidOrExpired),
            Err(e) => Err(e),
        }
    }

    /// Replace the password and revoke every live session of the user.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> GatehouseResult<ResetPasswordOutcome> {
        let ConsumeOutcome::Consumed(row) = self.consume(TokenPurpose::PasswordReset, token).await?
        else {
            return Ok(ResetPasswordOutcome::InvalidOrExpired);
        };

        let password_hash = password::hash_password(new_password, self.config.pepper.as_deref())?;
        let update = UpdateUser {
            password_hash: Some(password_hash),
            ..Default::default()
        };
        match self.users.update(row.tenant_id, row.user_id, update).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Ok(ResetPasswordOutcome::InvalidOrExpired),
            Err(e) => return Err(e),
        }

        let revoked = self
            .sessions
            .revoke_user_sessions(row.tenant_id, row.user_id)
            .await?;
        info!(
            tenant_id = %row.tenant_id,
            user_id = %row.user_id,
            revoked,
            "password reset, sessions revoked"
        );
        Ok(ResetPasswordOutcome::Reset)
    }
}
