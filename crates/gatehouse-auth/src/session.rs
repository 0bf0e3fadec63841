//! Session issuance, refresh-token rotation with replay detection, and
//! logout.
//!
//! Every refresh token embeds the id of the session row it is bound to
//! (`sid`). A successful refresh retires that row as `Rotated` and mints
//! a new one in the same family. Presenting a token whose row is no
//! longer live is treated as theft and revokes the whole family.

use chrono::{Duration, Utc};
use gatehouse_core::error::GatehouseResult;
use gatehouse_core::models::session::{CreateSession, RevokeReason, Session, SessionState};
use gatehouse_core::models::user::{UpdateUser, User, UserStatus};
use gatehouse_core::repository::{SessionRepository, UserRepository};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::token::{TokenCodec, TokenKind, VerifiedToken, constant_time_eq, hash_token};

/// Paired access/refresh tokens handed to a client.
#[derive(Debug, Clone, Serialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    #[serde(skip)]
    pub session_id: Uuid,
}

#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Refreshed(TokenSet),
    Invalid,
}

/// Issues and rotates session tokens.
#[derive(Clone)]
pub struct SessionManager<S: SessionRepository, U: UserRepository> {
    sessions: S,
    users: U,
    codec: TokenCodec,
}

impl<S: SessionRepository, U: UserRepository> SessionManager<S, U> {
    pub fn new(sessions: S, users: U, codec: TokenCodec) -> Self {
        Self {
            sessions,
            users,
            codec,
        }
    }

    /// Start a new session family for `user` and record the login.
    pub async fn issue_tokens(&self, user: &User) -> GatehouseResult<TokenSet> {
        let tokens = self.mint(user, Uuid::new_v4()).await?;

        self.users
            .update(
                user.tenant_id,
                user.id,
                UpdateUser {
                    last_login_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;

        info!(
            tenant_id = %user.tenant_id,
            user_id = %user.id,
            session_id = %tokens.session_id,
            "session issued"
        );
        Ok(tokens)
    }

    async fn mint(&self, user: &User, family_id: Uuid) -> GatehouseResult<TokenSet> {
        let session_id = Uuid::new_v4();
        let refresh_token = self.codec.sign_refresh(user.id, user.tenant_id, session_id)?;
        let access_token = self.codec.sign_access(user.id, user.tenant_id)?;
        let expires_at = Utc::now() + Duration::seconds(self.codec.refresh_lifetime_secs() as i64);

        self.sessions
            .create(CreateSession {
                id: session_id,
                tenant_id: user.tenant_id,
                user_id: user.id,
                family_id,
                token_hash: hash_token(&refresh_token),
                expires_at,
            })
            .await?;

        Ok(TokenSet {
            access_token,
            refresh_token,
            expires_in: self.codec.access_lifetime_secs(),
            session_id,
        })
    }

    /// Exchange a refresh token for a new pair. A given refresh token
    /// succeeds at most once; any later presentation revokes its family.
    pub async fn refresh(&self, presented: &str) -> GatehouseResult<RefreshOutcome> {
        let claims = match self.codec.verify(presented, TokenKind::Refresh) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "refresh token rejected");
                return Ok(RefreshOutcome::Invalid);
            }
        };
        let Some(session) = self.load_session(&claims).await? else {
            return Ok(RefreshOutcome::Invalid);
        };
        let tenant_id = session.tenant_id;

        let state = session.state_at(Utc::now());
        if state.ensure_transition(SessionState::Rotated).is_err() {
            if state != SessionState::Expired {
                self.revoke_family(&session, "refresh token replayed").await?;
            }
            return Ok(RefreshOutcome::Invalid);
        }

        let presented_hash = hash_token(presented);
        if !constant_time_eq(presented_hash.as_bytes(), session.token_hash.as_bytes()) {
            self.revoke_family(&session, "refresh token hash mismatch").await?;
            return Ok(RefreshOutcome::Invalid);
        }

        // Only one concurrent refresh can flip the row; the loser is
        // holding a token that is now spent.
        if !self
            .sessions
            .revoke(tenant_id, session.id, RevokeReason::Rotated)
            .await?
        {
            self.revoke_family(&session, "concurrent refresh of the same token").await?;
            return Ok(RefreshOutcome::Invalid);
        }

        let user = match self.users.get_by_id(tenant_id, session.user_id).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => return Ok(RefreshOutcome::Invalid),
            Err(e) => return Err(e),
        };
        if user.status != UserStatus::Active {
            self.sessions.revoke_family(tenant_id, session.family_id).await?;
            debug!(%tenant_id, user_id = %user.id, "refresh denied for inactive user");
            return Ok(RefreshOutcome::Invalid);
        }

        let tokens = self.mint(&user, session.family_id).await?;
        debug!(
            %tenant_id,
            user_id = %user.id,
            old_session_id = %session.id,
            session_id = %tokens.session_id,
            "session rotated"
        );
        Ok(RefreshOutcome::Refreshed(tokens))
    }

    async fn load_session(&self, claims: &VerifiedToken) -> GatehouseResult<Option<Session>> {
        let Some(session_id) = claims.session_id else {
            return Ok(None);
        };
        let session = match self.sessions.get_by_id(claims.tenant_id, session_id).await {
            Ok(session) => session,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        if session.user_id != claims.user_id {
            warn!(
                tenant_id = %claims.tenant_id,
                session_id = %session_id,
                "refresh token subject does not own its session"
            );
            return Ok(None);
        }
        Ok(Some(session))
    }

    async fn revoke_family(&self, session: &Session, reason: &str) -> GatehouseResult<()> {
        let revoked = self
            .sessions
            .revoke_family(session.tenant_id, session.family_id)
            .await?;
        warn!(
            tenant_id = %session.tenant_id,
            user_id = %session.user_id,
            session_id = %session.id,
            family_id = %session.family_id,
            revoked,
            reason,
            "possible refresh token theft, session family revoked"
        );
        Ok(())
    }

    /// Revoke the session a refresh token belongs to. Tokens that fail
    /// verification are treated as already logged out.
    pub async fn logout(&self, refresh_token: &str) -> GatehouseResult<()> {
        let Ok(claims) = self.codec.verify(refresh_token, TokenKind::Refresh) else {
            return Ok(());
        };
        let Some(session) = self.load_session(&claims).await? else {
            return Ok(());
        };
        if self
            .sessions
            .revoke(session.tenant_id, session.id, RevokeReason::Revoked)
            .await?
        {
            info!(
                tenant_id = %session.tenant_id,
                user_id = %session.user_id,
                session_id = %session.id,
                "session logged out"
            );
        }
        Ok(())
    }

    /// Stateless access-token check for request authentication.
    pub fn authenticate(&self, access_token: &str) -> Option<VerifiedToken> {
        self.codec.verify(access_token, TokenKind::Access).ok()
    }

    pub async fn cleanup_expired(&self, tenant_id: Uuid) -> GatehouseResult<u64> {
        self.sessions.cleanup_expired(tenant_id).await
    }
}
