//! Owner-only administration of tenant members.
//!
//! Every mutation is a single conditional write. The [`MemberEvent`] is
//! appended only once that write took effect, so the audit trail never
//! records a change that lost a race.

use gatehouse_core::error::GatehouseResult;
use gatehouse_core::models::member_event::{CreateMemberEvent, MemberEvent, MemberEventKind};
use gatehouse_core::models::user::{Member, MemberRole, User, UserStatus};
use gatehouse_core::repository::{
    MemberEventRepository, PaginatedResult, Pagination, SessionRepository, UserRepository,
};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

const PAGE_SIZE: u64 = 200;

#[derive(Debug, Clone)]
pub enum ApproveOutcome {
    Approved(Member),
    NotOwner,
    UserNotFound,
    NotPending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectOutcome {
    Rejected,
    NotOwner,
    UserNotFound,
    NotPending,
}

#[derive(Debug, Clone)]
pub enum RemoveOutcome {
    Removed(Member),
    NotOwner,
    UserNotFound,
    CannotModifySelf,
}

#[derive(Debug, Clone)]
pub enum RoleChangeOutcome {
    Updated(Member),
    NotOwner,
    UserNotFound,
    CannotModifySelf,
}

#[derive(Debug, Clone)]
pub enum EventListOutcome {
    Listed(PaginatedResult<MemberEvent>),
    NotOwner,
}

/// True when `actor_id` is an active owner of the tenant.
pub(crate) async fn is_active_owner<U: UserRepository>(
    users: &U,
    tenant_id: Uuid,
    actor_id: Uuid,
) -> GatehouseResult<bool> {
    match users.get_by_id(tenant_id, actor_id).await {
        Ok(actor) => Ok(actor.role == MemberRole::Owner && actor.status == UserStatus::Active),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

#[derive(Clone)]
pub struct MemberRegistry<U: UserRepository, S: SessionRepository, E: MemberEventRepository> {
    users: U,
    sessions: S,
    events: E,
}

impl<U, S, E> MemberRegistry<U, S, E>
where
    U: UserRepository,
    S: SessionRepository,
    E: MemberEventRepository,
{
    pub fn new(users: U, sessions: S, events: E) -> Self {
        Self {
            users,
            sessions,
            events,
        }
    }

    /// All members in join order.
    pub async fn list_members(&self, tenant_id: Uuid) -> GatehouseResult<Vec<Member>> {
        let mut members = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .users
                .list(
                    tenant_id,
                    Pagination {
                        offset,
                        limit: PAGE_SIZE,
                    },
                )
                .await?;
            let fetched = page.items.len() as u64;
            members.extend(page.items.into_iter().map(Member::from));
            offset += fetched;
            if fetched < PAGE_SIZE || offset >= page.total {
                break;
            }
        }
        Ok(members)
    }

    async fn find_target(&self, tenant_id: Uuid, target_id: Uuid) -> GatehouseResult<Option<User>> {
        match self.users.get_by_id(tenant_id, target_id).await {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn record(
        &self,
        tenant_id: Uuid,
        actor_id: Uuid,
        target_id: Uuid,
        event: MemberEventKind,
        metadata: serde_json::Value,
    ) -> GatehouseResult<()> {
        self.events
            .append(CreateMemberEvent {
                tenant_id,
                target_user_id: target_id,
                actor_user_id: actor_id,
                event,
                metadata,
            })
            .await?;
        info!(
            %tenant_id,
            actor_id = %actor_id,
            user_id = %target_id,
            event = event.as_str(),
            "membership changed"
        );
        Ok(())
    }

    /// Tell an outcome-less conditional write apart: the user is gone,
    /// or it exists in some other state.
    async fn still_exists(&self, tenant_id: Uuid, target_id: Uuid) -> GatehouseResult<bool> {
        Ok(self.find_target(tenant_id, target_id).await?.is_some())
    }

    pub async fn approve(
        &self,
        actor_id: Uuid,
        tenant_id: Uuid,
        target_id: Uuid,
    ) -> GatehouseResult<ApproveOutcome> {
        if !is_active_owner(&self.users, tenant_id, actor_id).await? {
            return Ok(ApproveOutcome::NotOwner);
        }

        let approved = self
            .users
            .transition_status(
                tenant_id,
                target_id,
                UserStatus::PendingApproval,
                UserStatus::Active,
            )
            .await?;
        let Some(member) = approved else {
            return Ok(if self.still_exists(tenant_id, target_id).await? {
                ApproveOutcome::NotPending
            } else {
                ApproveOutcome::UserNotFound
            });
        };

        self.record(
            tenant_id,
            actor_id,
            target_id,
            MemberEventKind::Approved,
            json!({ "username": member.username }),
        )
        .await?;
        Ok(ApproveOutcome::Approved(member.into()))
    }

    /// Delete a pending applicant outright.
    pub async fn reject(
        &self,
        actor_id: Uuid,
        tenant_id: Uuid,
        target_id: Uuid,
    ) -> GatehouseResult<RejectOutcome> {
        if !is_active_owner(&self.users, tenant_id, actor_id).await? {
            return Ok(RejectOutcome::NotOwner);
        }

        let deleted = self
            .users
            .delete(tenant_id, target_id, Some(UserStatus::PendingApproval))
            .await?;
        let Some(applicant) = deleted else {
            return Ok(if self.still_exists(tenant_id, target_id).await? {
                RejectOutcome::NotPending
            } else {
                RejectOutcome::UserNotFound
            });
        };

        self.record(
            tenant_id,
            actor_id,
            target_id,
            MemberEventKind::Rejected,
            json!({ "username": applicant.username, "email": applicant.email }),
        )
        .await?;
        Ok(RejectOutcome::Rejected)
    }

    /// Delete a member and revoke all of their sessions.
    pub async fn remove_member(
        &self,
        actor_id: Uuid,
        tenant_id: Uuid,
        target_id: Uuid,
    ) -> GatehouseResult<RemoveOutcome> {
        if !is_active_owner(&self.users, tenant_id, actor_id).await? {
            return Ok(RemoveOutcome::NotOwner);
        }
        if actor_id == target_id {
            return Ok(RemoveOutcome::CannotModifySelf);
        }

        let Some(removed) = self.users.delete(tenant_id, target_id, None).await? else {
            return Ok(RemoveOutcome::UserNotFound);
        };
        self.sessions.revoke_user_sessions(tenant_id, target_id).await?;

        self.record(
            tenant_id,
            actor_id,
            target_id,
            MemberEventKind::Removed,
            json!({ "username": removed.username, "role": removed.role.as_str() }),
        )
        .await?;
        Ok(RemoveOutcome::Removed(removed.into()))
    }

    pub async fn update_member_role(
        &self,
        actor_id: Uuid,
        tenant_id: Uuid,
        target_id: Uuid,
        role: MemberRole,
    ) -> GatehouseResult<RoleChangeOutcome> {
        if !is_active_owner(&self.users, tenant_id, actor_id).await? {
            return Ok(RoleChangeOutcome::NotOwner);
        }
        if actor_id == target_id {
            return Ok(RoleChangeOutcome::CannotModifySelf);
        }
        let Some(target) = self.find_target(tenant_id, target_id).await? else {
            return Ok(RoleChangeOutcome::UserNotFound);
        };
        if target.role == role {
            return Ok(RoleChangeOutcome::Updated(target.into()));
        }

        let changed = self
            .users
            .change_role(tenant_id, target_id, target.role, role)
            .await?;
        let Some(updated) = changed else {
            // Someone else changed or removed the member in between.
            return Ok(match self.find_target(tenant_id, target_id).await? {
                Some(current) if current.role == role => RoleChangeOutcome::Updated(current.into()),
                Some(_) | None => RoleChangeOutcome::UserNotFound,
            });
        };

        self.record(
            tenant_id,
            actor_id,
            target_id,
            MemberEventKind::RoleChanged,
            json!({ "from": target.role.as_str(), "to": role.as_str() }),
        )
        .await?;
        Ok(RoleChangeOutcome::Updated(updated.into()))
    }

    /// The membership audit trail, oldest first.
    pub async fn list_events(
        &self,
        actor_id: Uuid,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> GatehouseResult<EventListOutcome> {
        if !is_active_owner(&self.users, tenant_id, actor_id).await? {
            return Ok(EventListOutcome::NotOwner);
        }
        let events = self.events.list(tenant_id, pagination).await?;
        Ok(EventListOutcome::Listed(events))
    }
}
