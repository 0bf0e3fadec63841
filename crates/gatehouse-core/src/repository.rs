//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Tenant-scoped repositories take
//! the `tenant_id` as an explicit parameter on every call: the tenant
//! context is bound per operation, never stored on a shared handle, so a
//! pooled connection cannot leak one tenant's scope into another's query.
//!
//! Mutual exclusion is expressed as conditional writes. Methods that
//! guard a lifecycle transition report whether *this* call performed it.

use uuid::Uuid;

use crate::error::GatehouseResult;
use crate::models::{
    invite::{CreateInvite, Invite, InviteStatus},
    member_event::{CreateMemberEvent, MemberEvent},
    secondary_token::{CreateSecondaryToken, SecondaryToken, TokenPurpose},
    session::{CreateSession, RevokeReason, Session},
    tenant::{CreateTenant, Tenant},
    user::{CreateUser, MemberRole, UpdateUser, User, UserStatus},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Tenants (global scope)
// ---------------------------------------------------------------------------

pub trait TenantRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the slug is taken.
    fn create(&self, input: CreateTenant) -> impl Future<Output = GatehouseResult<Tenant>> + Send;
    /// Expects an already normalized slug.
    fn get_by_slug(&self, slug: &str) -> impl Future<Output = GatehouseResult<Tenant>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = GatehouseResult<()>> + Send;
    /// All tenants, oldest first. Used by maintenance sweeps.
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = GatehouseResult<PaginatedResult<Tenant>>> + Send;
}

// ---------------------------------------------------------------------------
// Tenant-scoped repositories
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    /// Fails with `AlreadyExists` on a duplicate username or email.
    fn create(&self, input: CreateUser) -> impl Future<Output = GatehouseResult<User>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = GatehouseResult<User>> + Send;
    fn get_by_username(
        &self,
        tenant_id: Uuid,
        username: &str,
    ) -> impl Future<Output = GatehouseResult<User>> + Send;
    /// Expects an already normalized email.
    fn get_by_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> impl Future<Output = GatehouseResult<User>> + Send;
    fn count(&self, tenant_id: Uuid) -> impl Future<Output = GatehouseResult<u64>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = GatehouseResult<User>> + Send;
    /// Move the user from `from` to `to` if the row still has `from`.
    /// `None` when the user is gone or its status moved on first. Pairs
    /// outside the status table are an `InvalidTransition` error.
    fn transition_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        from: UserStatus,
        to: UserStatus,
    ) -> impl Future<Output = GatehouseResult<Option<User>>> + Send;
    /// Set the role if the row still has `from`, with the same `None`
    /// contract as [`UserRepository::transition_status`].
    fn change_role(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        from: MemberRole,
        to: MemberRole,
    ) -> impl Future<Output = GatehouseResult<Option<User>>> + Send;
    /// Hard delete, limited to users whose status is `only_if` when
    /// given. Returns the removed row, `None` if nothing matched.
    fn delete(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        only_if: Option<UserStatus>,
    ) -> impl Future<Output = GatehouseResult<Option<User>>> + Send;
    /// Users in join order (oldest first).
    fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = GatehouseResult<PaginatedResult<User>>> + Send;
}

pub trait SessionRepository: Send + Sync {
    fn create(&self, input: CreateSession) -> impl Future<Output = GatehouseResult<Session>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = GatehouseResult<Session>> + Send;
    /// Revoke one session if it is not already revoked. Returns `true`
    /// only for the caller whose write took effect.
    fn revoke(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        reason: RevokeReason,
    ) -> impl Future<Output = GatehouseResult<bool>> + Send;
    /// Revoke every live session in a refresh-token chain.
    fn revoke_family(
        &self,
        tenant_id: Uuid,
        family_id: Uuid,
    ) -> impl Future<Output = GatehouseResult<u64>> + Send;
    /// Revoke every live session of a user (password change, removal).
    fn revoke_user_sessions(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = GatehouseResult<u64>> + Send;
    /// Remove all expired sessions.
    fn cleanup_expired(&self, tenant_id: Uuid) -> impl Future<Output = GatehouseResult<u64>> + Send;
}

pub trait InviteRepository: Send + Sync {
    fn create(&self, input: CreateInvite) -> impl Future<Output = GatehouseResult<Invite>> + Send;
    fn get_by_code_hash(
        &self,
        tenant_id: Uuid,
        code_hash: &str,
    ) -> impl Future<Output = GatehouseResult<Invite>> + Send;
    /// Move every pending invite whose expiry has passed to `Expired`.
    fn expire_stale(&self, tenant_id: Uuid) -> impl Future<Output = GatehouseResult<u64>> + Send;
    /// Move a `Pending`, unexpired invite to `to`, checked against the
    /// invite transition table. `consumed_by` is recorded for
    /// `Consumed`. Returns `None` when the invite was no longer pending
    /// (or had expired) at write time.
    fn transition(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        to: InviteStatus,
        consumed_by: Option<Uuid>,
    ) -> impl Future<Output = GatehouseResult<Option<Invite>>> + Send;
    /// Newest first.
    fn list_recent(
        &self,
        tenant_id: Uuid,
        limit: u64,
    ) -> impl Future<Output = GatehouseResult<Vec<Invite>>> + Send;
}

pub trait SecondaryTokenRepository: Send + Sync {
    fn create(
        &self,
        input: CreateSecondaryToken,
    ) -> impl Future<Output = GatehouseResult<SecondaryToken>> + Send;
    /// Drop every unconsumed token of `purpose` for the user.
    fn invalidate_unconsumed(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        purpose: TokenPurpose,
    ) -> impl Future<Output = GatehouseResult<u64>> + Send;
    /// Global lookup: token hashes are unique across tenants.
    fn get_by_hash(
        &self,
        purpose: TokenPurpose,
        token_hash: &str,
    ) -> impl Future<Output = GatehouseResult<SecondaryToken>> + Send;
    /// Mark consumed if still unconsumed and unexpired. Returns `true`
    /// only for the caller whose write took effect.
    fn mark_consumed(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = GatehouseResult<bool>> + Send;
}

// ---------------------------------------------------------------------------
// Member audit (append-only, tenant-scoped)
// ---------------------------------------------------------------------------

pub trait MemberEventRepository: Send + Sync {
    /// Append a new event. No update or delete operations exist.
    fn append(
        &self,
        input: CreateMemberEvent,
    ) -> impl Future<Output = GatehouseResult<MemberEvent>> + Send;
    /// Oldest first.
    fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = GatehouseResult<PaginatedResult<MemberEvent>>> + Send;
}
