//! Signup of new tenants and joining existing ones.
//!
//! The user row is inserted before the invite is consumed. Consumption
//! is a conditional write, so when two joins race one invite exactly
//! one of them flips it; the other deletes the user it just created and
//! reports `InvalidInviteCode`. The same compensation guards first-user
//! bootstrap: only the earliest user of an empty tenant keeps the owner
//! role.

use gatehouse_core::error::{GatehouseError, GatehouseResult};
use gatehouse_core::models::invite::Invite;
use gatehouse_core::models::secondary_token::TokenPurpose;
use gatehouse_core::models::tenant::{MembershipPolicy, Tenant};
use gatehouse_core::models::user::{CreateUser, MemberRole, User, UserStatus, normalize_email};
use gatehouse_core::repository::{
    InviteRepository, Pagination, SecondaryTokenRepository, SessionRepository, TenantRepository,
    UserRepository,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::credential::CredentialStore;
use crate::invite::InviteLedger;
use crate::mailer::{Links, Mailer, deliver, verification_email};
use crate::secondary::SecondaryTokenIssuer;
use crate::session::{SessionManager, TokenSet};
use crate::tenant_directory::{CreateTenantOutcome, ResolveOutcome, TenantDirectory};

#[derive(Debug, Clone)]
pub struct SignupInput {
    pub tenant_slug: String,
    pub tenant_name: String,
    pub policy: MembershipPolicy,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct JoinInput {
    pub tenant_slug: String,
    pub username: String,
    pub email: String,
    pub password: String,
    /// Blank codes count as absent.
    pub invite_code: Option<String>,
}

#[derive(Debug, Clone)]
pub enum SignupOutcome {
    Authenticated(TokenSet),
    SlugTaken,
    UsernameTaken,
    EmailTaken,
    VerificationRequired,
}

#[derive(Debug, Clone)]
pub enum JoinOutcome {
    Authenticated(TokenSet),
    TenantNotFound,
    InviteRequired,
    /// No such pending invite, or it targets a different email.
    InvalidInviteCode,
    UsernameTaken,
    EmailTaken,
    PendingApproval,
    VerificationRequired,
}

/// Which per-tenant uniqueness rule a new user would break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clash {
    Username,
    Email,
}

impl Clash {
    fn of(err: &GatehouseError) -> Option<Self> {
        if err.is_conflict_on("username") {
            Some(Clash::Username)
        } else if err.is_conflict_on("email") {
            Some(Clash::Email)
        } else {
            None
        }
    }
}

impl From<Clash> for JoinOutcome {
    fn from(clash: Clash) -> Self {
        match clash {
            Clash::Username => JoinOutcome::UsernameTaken,
            Clash::Email => JoinOutcome::EmailTaken,
        }
    }
}

impl From<Clash> for SignupOutcome {
    fn from(clash: Clash) -> Self {
        match clash {
            Clash::Username => SignupOutcome::UsernameTaken,
            Clash::Email => SignupOutcome::EmailTaken,
        }
    }
}

pub struct JoinWorkflow<T, U, I, S, K, M>
where
    T: TenantRepository,
    U: UserRepository,
    I: InviteRepository,
    S: SessionRepository,
    K: SecondaryTokenRepository,
    M: Mailer,
{
    directory: TenantDirectory<T, U>,
    credentials: CredentialStore<U, S>,
    invites: InviteLedger<I, U>,
    sessions: SessionManager<S, U>,
    issuer: SecondaryTokenIssuer<K, U, S>,
    mailer: M,
    links: Links,
    require_email_verification: bool,
}

impl<T, U, I, S, K, M> JoinWorkflow<T, U, I, S, K, M>
where
    T: TenantRepository,
    U: UserRepository,
    I: InviteRepository,
    S: SessionRepository,
    K: SecondaryTokenRepository,
    M: Mailer,
{
    pub fn new(
        directory: TenantDirectory<T, U>,
        credentials: CredentialStore<U, S>,
        invites: InviteLedger<I, U>,
        sessions: SessionManager<S, U>,
        issuer: SecondaryTokenIssuer<K, U, S>,
        mailer: M,
        config: &AuthConfig,
    ) -> Self {
        Self {
            directory,
            credentials,
            invites,
            sessions,
            issuer,
            mailer,
            links: Links::new(&config.base_url),
            require_email_verification: config.require_email_verification,
        }
    }

    fn users(&self) -> &U {
        self.credentials.users()
    }

    /// Create a tenant and its owner. If the owner cannot be inserted
    /// the tenant is deleted again.
    pub async fn signup(&self, input: SignupInput) -> GatehouseResult<SignupOutcome> {
        let email = non_blank_email(&input.email);
        let password_hash = self.credentials.hash(&input.password)?;

        let tenant = match self
            .directory
            .create(&input.tenant_slug, &input.tenant_name, input.policy)
            .await?
        {
            CreateTenantOutcome::Created(tenant) => tenant,
            CreateTenantOutcome::SlugTaken => return Ok(SignupOutcome::SlugTaken),
        };

        let created = self
            .users()
            .create(CreateUser {
                tenant_id: tenant.id,
                username: input.username,
                email,
                password_hash,
                role: MemberRole::Owner,
                status: UserStatus::Active,
                email_verified_at: None,
            })
            .await;
        let owner = match created {
            Ok(owner) => owner,
            Err(e) => {
                self.directory.discard(tenant.id).await?;
                warn!(tenant_id = %tenant.id, error = %e, "owner insert failed, tenant discarded");
                return match Clash::of(&e) {
                    Some(clash) => Ok(clash.into()),
                    None => Err(e),
                };
            }
        };

        info!(tenant_id = %tenant.id, user_id = %owner.id, slug = %tenant.slug, "tenant signed up");
        self.send_verification(&owner).await;

        Ok(match self.start_session(&owner).await? {
            Some(tokens) => SignupOutcome::Authenticated(tokens),
            None => SignupOutcome::VerificationRequired,
        })
    }

    pub async fn join(&self, input: JoinInput) -> GatehouseResult<JoinOutcome> {
        let ResolveOutcome::Resolved(tenant) = self.directory.resolve(&input.tenant_slug).await?
        else {
            return Ok(JoinOutcome::TenantNotFound);
        };
        let email = non_blank_email(&input.email);

        // An empty tenant is claimed by its first user without an invite.
        let bootstrap = self.directory.user_count(tenant.id).await? == 0;

        let invite = if bootstrap {
            None
        } else {
            let code = input
                .invite_code
                .as_deref()
                .map(str::trim)
                .filter(|code| !code.is_empty());
            let Some(code) = code else {
                return Ok(JoinOutcome::InviteRequired);
            };
            match self.invites.find_usable(tenant.id, code).await? {
                Some(invite) if targets(&invite, email.as_deref()) => Some(invite),
                _ => return Ok(JoinOutcome::InvalidInviteCode),
            }
        };

        if let Some(clash) = self
            .find_clash(tenant.id, &input.username, email.as_deref())
            .await?
        {
            return Ok(clash.into());
        }

        let (role, status) = match (bootstrap, tenant.policy) {
            (true, _) => (MemberRole::Owner, UserStatus::Active),
            (false, MembershipPolicy::ApprovalRequired) => {
                (MemberRole::Member, UserStatus::PendingApproval)
            }
            (false, MembershipPolicy::InviteOnly) => (MemberRole::Member, UserStatus::Active),
        };

        let password_hash = self.credentials.hash(&input.password)?;
        let user = match self
            .users()
            .create(CreateUser {
                tenant_id: tenant.id,
                username: input.username,
                email,
                password_hash,
                role,
                status,
                email_verified_at: None,
            })
            .await
        {
            Ok(user) => user,
            Err(e) => {
                return match Clash::of(&e) {
                    Some(clash) => Ok(clash.into()),
                    None => Err(e),
                };
            }
        };

        match &invite {
            Some(invite) => match self.invites.consume(tenant.id, invite.id, user.id).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    self.roll_back(&user, "invite no longer pending").await?;
                    return Ok(JoinOutcome::InvalidInviteCode);
                }
                Err(e) => {
                    self.roll_back(&user, "invite consumption failed").await?;
                    return Err(e);
                }
            },
            None => {
                if !self.is_earliest(&tenant, &user).await? {
                    self.roll_back(&user, "lost first-user bootstrap race").await?;
                    return Ok(JoinOutcome::InviteRequired);
                }
            }
        }

        info!(
            tenant_id = %tenant.id,
            user_id = %user.id,
            role = user.role.as_str(),
            status = user.status.as_str(),
            invite_id = ?invite.as_ref().map(|i| i.id),
            "member joined"
        );
        self.send_verification(&user).await;

        if user.status == UserStatus::PendingApproval {
            return Ok(JoinOutcome::PendingApproval);
        }
        Ok(match self.start_session(&user).await? {
            Some(tokens) => JoinOutcome::Authenticated(tokens),
            None => JoinOutcome::VerificationRequired,
        })
    }

    async fn find_clash(
        &self,
        tenant_id: Uuid,
        username: &str,
        email: Option<&str>,
    ) -> GatehouseResult<Option<Clash>> {
        match self.users().get_by_username(tenant_id, username).await {
            Ok(_) => return Ok(Some(Clash::Username)),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        let Some(email) = email else {
            return Ok(None);
        };
        match self.users().get_by_email(tenant_id, email).await {
            Ok(_) => Ok(Some(Clash::Email)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn is_earliest(&self, tenant: &Tenant, user: &User) -> GatehouseResult<bool> {
        let first = self
            .users()
            .list(tenant.id, Pagination { offset: 0, limit: 1 })
            .await?;
        Ok(first.items.first().is_some_and(|u| u.id == user.id))
    }

    async fn roll_back(&self, user: &User, reason: &str) -> GatehouseResult<()> {
        warn!(tenant_id = %user.tenant_id, user_id = %user.id, reason, "join rolled back");
        self.users().delete(user.tenant_id, user.id, None).await?;
        Ok(())
    }

    /// Issue tokens unless the deployment requires a verified email the
    /// user does not have yet.
    async fn start_session(&self, user: &User) -> GatehouseResult<Option<TokenSet>> {
        if self.require_email_verification && user.email_verified_at.is_none() {
            return Ok(None);
        }
        self.sessions.issue_tokens(user).await.map(Some)
    }

    /// Issue a verification token and mail the link. Failures are
    /// logged only.
    async fn send_verification(&self, user: &User) {
        let Some(to) = user.email.as_deref() else {
            return;
        };
        let issued = match self
            .issuer
            .issue(TokenPurpose::EmailVerification, user.tenant_id, user.id)
            .await
        {
            Ok(issued) => issued,
            Err(e) => {
                warn!(tenant_id = %user.tenant_id, user_id = %user.id, error = %e, "verification token not issued");
                return;
            }
        };
        let link = self.links.verify_email(&issued.token);
        deliver(&self.mailer, verification_email(to, &link)).await;
    }
}

fn non_blank_email(email: &str) -> Option<String> {
    Some(normalize_email(email)).filter(|email| !email.is_empty())
}

/// An untargeted invite admits anyone; a targeted one only its address.
fn targets(invite: &Invite, email: Option<&str>) -> bool {
    match invite.target_email.as_deref() {
        None => true,
        Some(target) => email == Some(target),
    }
}
