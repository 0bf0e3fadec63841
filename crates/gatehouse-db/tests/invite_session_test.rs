//! Integration tests for the Invite, Session and SecondaryToken
//! repositories: the conditional writes behind every lifecycle
//! transition.

use chrono::{Duration, Utc};
use gatehouse_core::error::GatehouseError;
use gatehouse_core::models::invite::{CreateInvite, Invite, InviteStatus};
use gatehouse_core::models::secondary_token::{CreateSecondaryToken, TokenPurpose};
use gatehouse_core::models::session::{CreateSession, RevokeReason, SessionState};
use gatehouse_core::repository::{
    InviteRepository, SecondaryTokenRepository, SessionRepository,
};
use gatehouse_db::repository::{
    SurrealInviteRepository, SurrealSecondaryTokenRepository, SurrealSessionRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    gatehouse_db::run_migrations(&db).await.unwrap();
    db
}

fn invite_input(tenant_id: Uuid, code_hash: &str, expires_in: Duration) -> CreateInvite {
    CreateInvite {
        tenant_id,
        created_by: Uuid::new_v4(),
        code_hash: code_hash.into(),
        target_email: None,
        expires_at: Utc::now() + expires_in,
    }
}

#[tokio::test]
async fn invite_consumes_exactly_once() {
    let repo = SurrealInviteRepository::new(setup().await);
    let tenant_id = Uuid::new_v4();
    let invite = repo
        .create(invite_input(tenant_id, "hash-1", Duration::days(7)))
        .await
        .unwrap();
    assert_eq!(invite.status, InviteStatus::Pending);

    let user_a = Uuid::new_v4();
    let consumed = repo
        .transition(tenant_id, invite.id, InviteStatus::Consumed, Some(user_a))
        .await
        .unwrap()
        .expect("first consume wins");
    assert_eq!(consumed.status, InviteStatus::Consumed);
    assert_eq!(consumed.consumed_by, Some(user_a));
    assert!(consumed.consumed_at.is_some());

    let second = repo
        .transition(tenant_id, invite.id, InviteStatus::Consumed, Some(Uuid::new_v4()))
        .await
        .unwrap();
    assert!(second.is_none());

    let revoke = repo
        .transition(tenant_id, invite.id, InviteStatus::Revoked, None)
        .await
        .unwrap();
    assert!(revoke.is_none(), "terminal invites cannot be revoked");
}

#[tokio::test]
async fn transition_back_to_pending_is_rejected() {
    let repo = SurrealInviteRepository::new(setup().await);
    let tenant_id = Uuid::new_v4();
    let invite = repo
        .create(invite_input(tenant_id, "hash-1", Duration::days(7)))
        .await
        .unwrap();

    let err = repo
        .transition(tenant_id, invite.id, InviteStatus::Pending, None)
        .await
        .unwrap_err();
    assert!(matches!(err, GatehouseError::InvalidTransition { .. }));
}

#[tokio::test]
async fn expired_invites_are_swept_and_cannot_be_consumed() {
    let repo = SurrealInviteRepository::new(setup().await);
    let tenant_id = Uuid::new_v4();
    let stale = repo
        .create(invite_input(tenant_id, "stale", Duration::seconds(-5)))
        .await
        .unwrap();
    let fresh = repo
        .create(invite_input(tenant_id, "fresh", Duration::days(1)))
        .await
        .unwrap();

    let consumed = repo
        .transition(tenant_id, stale.id, InviteStatus::Consumed, Some(Uuid::new_v4()))
        .await
        .unwrap();
    assert!(consumed.is_none());

    assert_eq!(repo.expire_stale(tenant_id).await.unwrap(), 1);
    let status_of = |invites: &[Invite], id: Uuid| {
        invites.iter().find(|i| i.id == id).map(|i| i.status)
    };
    let invites = repo.list_recent(tenant_id, 10).await.unwrap();
    assert_eq!(status_of(&invites, stale.id), Some(InviteStatus::Expired));
    assert_eq!(status_of(&invites, fresh.id), Some(InviteStatus::Pending));
    assert_eq!(repo.expire_stale(tenant_id).await.unwrap(), 0);
}

#[tokio::test]
async fn invites_listed_newest_first() {
    let repo = SurrealInviteRepository::new(setup().await);
    let tenant_id = Uuid::new_v4();
    for i in 0..3 {
        repo.create(invite_input(tenant_id, &format!("h{i}"), Duration::days(1)))
            .await
            .unwrap();
    }
    repo.create(invite_input(Uuid::new_v4(), "other-tenant", Duration::days(1)))
        .await
        .unwrap();

    let invites = repo.list_recent(tenant_id, 100).await.unwrap();
    let hashes: Vec<_> = invites.iter().map(|i| i.code_hash.as_str()).collect();
    assert_eq!(hashes, ["h2", "h1", "h0"]);
}

fn session_input(tenant_id: Uuid, user_id: Uuid, family_id: Uuid) -> CreateSession {
    CreateSession {
        id: Uuid::new_v4(),
        tenant_id,
        user_id,
        family_id,
        token_hash: "token-hash".into(),
        expires_at: Utc::now() + Duration::days(30),
    }
}

#[tokio::test]
async fn session_revoke_is_conditional() {
    let repo = SurrealSessionRepository::new(setup().await);
    let tenant_id = Uuid::new_v4();
    let session = repo
        .create(session_input(tenant_id, Uuid::new_v4(), Uuid::new_v4()))
        .await
        .unwrap();
    assert_eq!(session.state_at(Utc::now()), SessionState::Issued);

    assert!(repo.revoke(tenant_id, session.id, RevokeReason::Rotated).await.unwrap());
    assert!(!repo.revoke(tenant_id, session.id, RevokeReason::Revoked).await.unwrap());

    let reloaded = repo.get_by_id(tenant_id, session.id).await.unwrap();
    assert_eq!(reloaded.state_at(Utc::now()), SessionState::Rotated);
}

#[tokio::test]
async fn revoke_family_and_user_sessions() {
    let repo = SurrealSessionRepository::new(setup().await);
    let tenant_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();
    let family = Uuid::new_v4();

    let a = repo.create(session_input(tenant_id, user_id, family)).await.unwrap();
    let b = repo.create(session_input(tenant_id, user_id, family)).await.unwrap();
    let c = repo
        .create(session_input(tenant_id, user_id, Uuid::new_v4()))
        .await
        .unwrap();

    assert_eq!(repo.revoke_family(tenant_id, family).await.unwrap(), 2);
    for id in [a.id, b.id] {
        let s = repo.get_by_id(tenant_id, id).await.unwrap();
        assert_eq!(s.state_at(Utc::now()), SessionState::Revoked);
    }
    let c_live = repo.get_by_id(tenant_id, c.id).await.unwrap();
    assert_eq!(c_live.state_at(Utc::now()), SessionState::Issued);

    assert_eq!(repo.revoke_user_sessions(tenant_id, user_id).await.unwrap(), 1);
    assert_eq!(repo.revoke_user_sessions(tenant_id, user_id).await.unwrap(), 0);
}

#[tokio::test]
async fn session_lookup_is_tenant_scoped() {
    let repo = SurrealSessionRepository::new(setup().await);
    let tenant_id = Uuid::new_v4();
    let session = repo
        .create(session_input(tenant_id, Uuid::new_v4(), Uuid::new_v4()))
        .await
        .unwrap();

    let err = repo.get_by_id(Uuid::new_v4(), session.id).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn secondary_token_lifecycle() {
    let repo = SurrealSecondaryTokenRepository::new(setup().await);
    let tenant_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();

    let first = repo
        .create(CreateSecondaryToken {
            tenant_id,
            user_id,
            purpose: TokenPurpose::PasswordReset,
            token_hash: "reset-1".into(),
            expires_at: Utc::now() + Duration::hours(1),
        })
        .await
        .unwrap();

    assert_eq!(
        repo.invalidate_unconsumed(tenant_id, user_id, TokenPurpose::PasswordReset)
            .await
            .unwrap(),
        1
    );
    assert!(
        repo.get_by_hash(TokenPurpose::PasswordReset, "reset-1")
            .await
            .unwrap_err()
            .is_not_found()
    );

    let second = repo
        .create(CreateSecondaryToken {
            tenant_id,
            user_id,
            purpose: TokenPurpose::PasswordReset,
            token_hash: "reset-2".into(),
            expires_at: Utc::now() + Duration::hours(1),
        })
        .await
        .unwrap();
    assert_ne!(first.id, second.id);

    let found = repo
        .get_by_hash(TokenPurpose::PasswordReset, "reset-2")
        .await
        .unwrap();
    assert_eq!(found.id, second.id);
    // Purpose is part of the lookup.
    assert!(
        repo.get_by_hash(TokenPurpose::EmailVerification, "reset-2")
            .await
            .is_err()
    );

    assert!(repo.mark_consumed(tenant_id, second.id).await.unwrap());
    assert!(!repo.mark_consumed(tenant_id, second.id).await.unwrap());
}
