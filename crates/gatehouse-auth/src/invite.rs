//! Owner-issued invite codes.
//!
//! The plaintext code leaves this module exactly once, in
//! [`CreatedInvite`]. Only its SHA-256 hash is stored.

use chrono::{Duration, Utc};
use gatehouse_core::error::GatehouseResult;
use gatehouse_core::models::invite::{CreateInvite, Invite, InviteStatus};
use gatehouse_core::models::tenant::Tenant;
use gatehouse_core::models::user::normalize_email;
use gatehouse_core::repository::{InviteRepository, UserRepository};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::mailer::Links;
use crate::member::is_active_owner;
use crate::token::{generate_opaque_token, hash_token};

const LIST_LIMIT: u64 = 100;

/// A freshly created invite together with its one-time plaintext code.
#[derive(Debug, Clone)]
pub struct CreatedInvite {
    pub invite: Invite,
    pub code: String,
    pub join_url: String,
}

#[derive(Debug, Clone)]
pub enum InviteCreateOutcome {
    Created(CreatedInvite),
    NotOwner,
}

#[derive(Debug, Clone)]
pub enum InviteListOutcome {
    Listed(Vec<Invite>),
    NotOwner,
}

#[derive(Debug, Clone)]
pub enum InviteRevokeOutcome {
    Revoked(Invite),
    NotOwner,
    /// The invite does not exist or already left `Pending`.
    NotPending,
}

#[derive(Clone)]
pub struct InviteLedger<I: InviteRepository, U: UserRepository> {
    invites: I,
    users: U,
    links: Links,
    config: AuthConfig,
}

impl<I: InviteRepository, U: UserRepository> InviteLedger<I, U> {
    pub fn new(invites: I, users: U, config: AuthConfig) -> Self {
        Self {
            invites,
            users,
            links: Links::new(&config.base_url),
            config,
        }
    }

    pub async fn create(
        &self,
        actor_id: Uuid,
        tenant: &Tenant,
        target_email: Option<&str>,
        expires_in_days: Option<u32>,
    ) -> GatehouseResult<InviteCreateOutcome> {
        if !is_active_owner(&self.users, tenant.id, actor_id).await? {
            return Ok(InviteCreateOutcome::NotOwner);
        }

        let days = self.config.invite_expiry_days(expires_in_days);
        let code = generate_opaque_token();
        let target_email = target_email
            .map(normalize_email)
            .filter(|email| !email.is_empty());

        let invite = self
            .invites
            .create(CreateInvite {
                tenant_id: tenant.id,
                created_by: actor_id,
                code_hash: hash_token(&code),
                target_email,
                expires_at: Utc::now() + Duration::days(i64::from(days)),
            })
            .await?;

        info!(
            tenant_id = %tenant.id,
            invite_id = %invite.id,
            created_by = %actor_id,
            days,
            "invite created"
        );

        let join_url = self.links.join(&tenant.slug, &code);
        Ok(InviteCreateOutcome::Created(CreatedInvite {
            invite,
            code,
            join_url,
        }))
    }

    /// The most recent invites, newest first, after sweeping stale ones.
    pub async fn list(&self, actor_id: Uuid, tenant_id: Uuid) -> GatehouseResult<InviteListOutcome> {
        if !is_active_owner(&self.users, tenant_id, actor_id).await? {
            return Ok(InviteListOutcome::NotOwner);
        }
        self.expire_stale(tenant_id).await?;
        let invites = self.invites.list_recent(tenant_id, LIST_LIMIT).await?;
        Ok(InviteListOutcome::Listed(invites))
    }

    pub async fn revoke(
        &self,
        actor_id: Uuid,
        tenant_id: Uuid,
        invite_id: Uuid,
    ) -> GatehouseResult<InviteRevokeOutcome> {
        if !is_active_owner(&self.users, tenant_id, actor_id).await? {
            return Ok(InviteRevokeOutcome::NotOwner);
        }
        match self
            .invites
            .transition(tenant_id, invite_id, InviteStatus::Revoked, None)
            .await?
        {
            Some(invite) => {
                info!(%tenant_id, invite_id = %invite.id, revoked_by = %actor_id, "invite revoked");
                Ok(InviteRevokeOutcome::Revoked(invite))
            }
            None => Ok(InviteRevokeOutcome::NotPending),
        }
    }

    /// Find the pending, unexpired invite for a plaintext code.
    pub async fn find_usable(&self, tenant_id: Uuid, code: &str) -> GatehouseResult<Option<Invite>> {
        self.expire_stale(tenant_id).await?;
        let invite = match self.invites.get_by_code_hash(tenant_id, &hash_token(code)).await {
            Ok(invite) => invite,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(invite.is_usable_at(Utc::now()).then_some(invite))
    }

    /// Mark the invite consumed by `user_id`. `None` means another
    /// caller consumed, revoked or outlived it first.
    pub async fn consume(
        &self,
        tenant_id: Uuid,
        invite_id: Uuid,
        user_id: Uuid,
    ) -> GatehouseResult<Option<Invite>> {
        let consumed = self
            .invites
            .transition(tenant_id, invite_id, InviteStatus::Consumed, Some(user_id))
            .await?;
        if consumed.is_some() {
            info!(%tenant_id, %invite_id, %user_id, "invite consumed");
        }
        Ok(consumed)
    }

    async fn expire_stale(&self, tenant_id: Uuid) -> GatehouseResult<()> {
        let expired = self.invites.expire_stale(tenant_id).await?;
        if expired > 0 {
            debug!(%tenant_id, expired, "stale invites expired");
        }
        Ok(())
    }
}
