//! Integration tests for login, refresh rotation, replay detection and
//! logout.

mod common;

use chrono::Utc;
use common::{harness, harness_with, test_config};
use gatehouse_auth::AuthConfig;
use gatehouse_auth::credential::ChangePasswordOutcome;
use gatehouse_auth::login::LoginOutcome;
use gatehouse_auth::session::RefreshOutcome;
use gatehouse_core::models::session::SessionState;
use gatehouse_core::models::user::{MemberRole, UserStatus};
use gatehouse_core::repository::{SessionRepository, UserRepository};

#[tokio::test]
async fn login_issues_tokens_and_records_last_login() {
    let h = harness().await;
    let (tenant, _, _) = h.signup("acme", "alice").await;

    let outcome = h.login.login("acme", "alice", "alice-password").await.unwrap();
    let LoginOutcome::Authenticated(tokens) = outcome else {
        panic!("login failed: {outcome:?}");
    };
    assert_eq!(tokens.expires_in, 900);

    let claims = h.session_manager.authenticate(&tokens.access_token).unwrap();
    let alice = h.user(&tenant, "alice").await;
    assert_eq!(claims.user_id, alice.id);
    assert_eq!(claims.tenant_id, tenant.id);
    assert!(alice.last_login_at.is_some());
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let h = harness().await;
    h.signup("acme", "alice").await;

    for (slug, user, pw) in [
        ("acme", "alice", "wrong"),
        ("acme", "nobody", "alice-password"),
        ("globex", "alice", "alice-password"),
        ("acme", "ALICE", "alice-password"),
    ] {
        let outcome = h.login.login(slug, user, pw).await.unwrap();
        assert!(
            matches!(outcome, LoginOutcome::InvalidCredentials),
            "{slug}/{user}: {outcome:?}"
        );
    }
}

#[tokio::test]
async fn suspended_user_cannot_log_in() {
    let h = harness().await;
    let (tenant, owner, _) = h.signup("acme", "alice").await;
    h.users
        .transition_status(tenant.id, owner.id, UserStatus::Active, UserStatus::Suspended)
        .await
        .unwrap()
        .unwrap();

    let outcome = h.login.login("acme", "alice", "alice-password").await.unwrap();
    assert!(matches!(outcome, LoginOutcome::Suspended));
}

#[tokio::test]
async fn refresh_rotates_and_old_token_dies() {
    let h = harness().await;
    let (tenant, _, first) = h.signup("acme", "alice").await;

    let RefreshOutcome::Refreshed(second) =
        h.session_manager.refresh(&first.refresh_token).await.unwrap()
    else {
        panic!("first refresh failed");
    };
    assert_ne!(second.refresh_token, first.refresh_token);
    assert_ne!(second.session_id, first.session_id);

    let old = h.sessions.get_by_id(tenant.id, first.session_id).await.unwrap();
    let new = h.sessions.get_by_id(tenant.id, second.session_id).await.unwrap();
    assert_eq!(old.state_at(Utc::now()), SessionState::Rotated);
    assert_eq!(new.family_id, old.family_id);

    // Replaying the spent token is theft: the whole line is revoked.
    let replay = h.session_manager.refresh(&first.refresh_token).await.unwrap();
    assert!(matches!(replay, RefreshOutcome::Invalid));

    let new = h.sessions.get_by_id(tenant.id, second.session_id).await.unwrap();
    assert_eq!(new.state_at(Utc::now()), SessionState::Revoked);
    let after = h.session_manager.refresh(&second.refresh_token).await.unwrap();
    assert!(matches!(after, RefreshOutcome::Invalid));
}

#[tokio::test]
async fn replay_leaves_other_families_alone() {
    let h = harness().await;
    let (_, _, first) = h.signup("acme", "alice").await;
    let LoginOutcome::Authenticated(other) =
        h.login.login("acme", "alice", "alice-password").await.unwrap()
    else {
        panic!("login failed");
    };

    h.session_manager.refresh(&first.refresh_token).await.unwrap();
    h.session_manager.refresh(&first.refresh_token).await.unwrap();

    let outcome = h.session_manager.refresh(&other.refresh_token).await.unwrap();
    assert!(matches!(outcome, RefreshOutcome::Refreshed(_)));
}

#[tokio::test]
async fn concurrent_refresh_succeeds_at_most_once() {
    let h = harness().await;
    let (_, _, tokens) = h.signup("acme", "alice").await;

    let (a, b) = tokio::join!(
        h.session_manager.refresh(&tokens.refresh_token),
        h.session_manager.refresh(&tokens.refresh_token),
    );
    let successes = [&a, &b]
        .iter()
        .filter(|r| matches!(r, Ok(RefreshOutcome::Refreshed(_))))
        .count();
    assert!(successes <= 1, "a = {a:?}, b = {b:?}");
}

#[tokio::test]
async fn access_token_is_not_a_refresh_token() {
    let h = harness().await;
    let (_, _, tokens) = h.signup("acme", "alice").await;

    let outcome = h.session_manager.refresh(&tokens.access_token).await.unwrap();
    assert!(matches!(outcome, RefreshOutcome::Invalid));
    assert!(h.session_manager.authenticate(&tokens.refresh_token).is_none());

    let outcome = h.session_manager.refresh("garbage").await.unwrap();
    assert!(matches!(outcome, RefreshOutcome::Invalid));
}

#[tokio::test]
async fn token_from_another_deployment_is_rejected() {
    let h = harness().await;
    let (_, _, tokens) = h.signup("acme", "alice").await;

    let other = harness_with(AuthConfig {
        jwt_issuer: "elsewhere".into(),
        ..test_config()
    })
    .await;
    let outcome = other.session_manager.refresh(&tokens.refresh_token).await.unwrap();
    assert!(matches!(outcome, RefreshOutcome::Invalid));
}

#[tokio::test]
async fn logout_is_best_effort() {
    let h = harness().await;
    let (tenant, _, tokens) = h.signup("acme", "alice").await;

    h.session_manager.logout("not-a-token").await.unwrap();
    h.session_manager.logout(&tokens.access_token).await.unwrap();

    h.session_manager.logout(&tokens.refresh_token).await.unwrap();
    let session = h.sessions.get_by_id(tenant.id, tokens.session_id).await.unwrap();
    assert_eq!(session.state_at(Utc::now()), SessionState::Revoked);

    // Logging out twice is fine.
    h.session_manager.logout(&tokens.refresh_token).await.unwrap();
    let outcome = h.session_manager.refresh(&tokens.refresh_token).await.unwrap();
    assert!(matches!(outcome, RefreshOutcome::Invalid));
}

#[tokio::test]
async fn suspended_user_cannot_refresh() {
    let h = harness().await;
    let (tenant, owner, tokens) = h.signup("acme", "alice").await;
    h.users
        .transition_status(tenant.id, owner.id, UserStatus::Active, UserStatus::Suspended)
        .await
        .unwrap()
        .unwrap();

    let outcome = h.session_manager.refresh(&tokens.refresh_token).await.unwrap();
    assert!(matches!(outcome, RefreshOutcome::Invalid));
}

#[tokio::test]
async fn change_password_revokes_every_session() {
    let h = harness().await;
    let (tenant, owner, tokens) = h.signup("acme", "alice").await;

    let outcome = h
        .credentials
        .change_password(tenant.id, owner.id, "wrong", "new-password")
        .await
        .unwrap();
    assert_eq!(outcome, ChangePasswordOutcome::WrongCurrentPassword);

    let outcome = h
        .credentials
        .change_password(tenant.id, owner.id, "alice-password", "alice-password")
        .await
        .unwrap();
    assert_eq!(outcome, ChangePasswordOutcome::SamePassword);

    let outcome = h
        .credentials
        .change_password(tenant.id, uuid::Uuid::new_v4(), "x", "y")
        .await
        .unwrap();
    assert_eq!(outcome, ChangePasswordOutcome::UserNotFound);

    let outcome = h
        .credentials
        .change_password(tenant.id, owner.id, "alice-password", "new-password")
        .await
        .unwrap();
    assert_eq!(outcome, ChangePasswordOutcome::Changed);

    // The access token is still structurally valid; the session is gone.
    assert!(h.session_manager.authenticate(&tokens.access_token).is_some());
    let refresh = h.session_manager.refresh(&tokens.refresh_token).await.unwrap();
    assert!(matches!(refresh, RefreshOutcome::Invalid));

    let old = h.login.login("acme", "alice", "alice-password").await.unwrap();
    assert!(matches!(old, LoginOutcome::InvalidCredentials));
    let new = h.login.login("acme", "alice", "new-password").await.unwrap();
    assert!(matches!(new, LoginOutcome::Authenticated(_)));
}

#[tokio::test]
async fn unchanged_password_keeps_sessions() {
    let h = harness().await;
    let (tenant, owner, tokens) = h.signup("acme", "alice").await;

    let outcome = h
        .credentials
        .change_password(tenant.id, owner.id, "alice-password", "alice-password")
        .await
        .unwrap();
    assert_eq!(outcome, ChangePasswordOutcome::SamePassword);
    let refresh = h.session_manager.refresh(&tokens.refresh_token).await.unwrap();
    assert!(matches!(refresh, RefreshOutcome::Refreshed(_)));

    // Comparison is byte-exact: a case change is a new password.
    let outcome = h
        .credentials
        .change_password(tenant.id, owner.id, "alice-password", "Alice-password")
        .await
        .unwrap();
    assert_eq!(outcome, ChangePasswordOutcome::Changed);
}

fn bootstrap_config() -> AuthConfig {
    AuthConfig {
        bootstrap_admin_username: Some("admin".into()),
        bootstrap_admin_password: Some("correct horse".into()),
        ..test_config()
    }
}

#[tokio::test]
async fn bootstrap_admin_on_empty_default_tenant() {
    let h = harness_with(bootstrap_config()).await;
    let tenant = h.directory.ensure("default", "Default").await.unwrap();

    let outcome = h.login.login("default", "admin", "wrong").await.unwrap();
    assert!(matches!(outcome, LoginOutcome::InvalidCredentials));
    assert_eq!(h.directory.user_count(tenant.id).await.unwrap(), 0);

    let outcome = h.login.login("default", "admin", "correct horse").await.unwrap();
    assert!(matches!(outcome, LoginOutcome::Authenticated(_)));

    let admin = h.user(&tenant, "admin").await;
    assert_eq!(admin.role, MemberRole::Owner);
    assert!(admin.email_verified_at.is_some());

    // From now on the admin is an ordinary user.
    let outcome = h.login.login("default", "admin", "correct horse").await.unwrap();
    assert!(matches!(outcome, LoginOutcome::Authenticated(_)));
    assert_eq!(h.directory.user_count(tenant.id).await.unwrap(), 1);
}

#[tokio::test]
async fn bootstrap_admin_never_applies_once_users_exist() {
    let h = harness_with(bootstrap_config()).await;
    let tenant = h.directory.ensure("default", "Default").await.unwrap();
    h.join_ok(common::join_input("default", "first", "first@x.com", None))
        .await;

    let created = h
        .credentials
        .bootstrap_admin(&tenant, "admin", "correct horse")
        .await
        .unwrap();
    assert!(created.is_none());
}

#[tokio::test]
async fn bootstrap_admin_only_for_default_tenant() {
    let h = harness_with(bootstrap_config()).await;
    h.directory
        .create("acme", "Acme", Default::default())
        .await
        .unwrap();

    let outcome = h.login.login("acme", "admin", "correct horse").await.unwrap();
    assert!(matches!(outcome, LoginOutcome::InvalidCredentials));
}

#[tokio::test]
async fn verification_gate_on_login() {
    let h = harness_with(AuthConfig {
        require_email_verification: true,
        ..test_config()
    })
    .await;
    h.join
        .signup(common::signup_input("acme", "alice", "alice@acme.test"))
        .await
        .unwrap();

    let outcome = h.login.login("acme", "alice", "alice-password").await.unwrap();
    assert!(matches!(outcome, LoginOutcome::VerificationRequired));

    let token = h.mailer.last_token_for("alice@acme.test");
    h.issuer.verify_email(&token).await.unwrap();

    let outcome = h.login.login("acme", "alice", "alice-password").await.unwrap();
    assert!(matches!(outcome, LoginOutcome::Authenticated(_)));
}

#[tokio::test]
async fn cleanup_removes_only_expired_sessions() {
    let h = harness_with(AuthConfig {
        refresh_token_lifetime_secs: 0,
        ..test_config()
    })
    .await;
    let (tenant, owner, _) = h.signup("acme", "alice").await;

    assert_eq!(h.session_manager.cleanup_expired(tenant.id).await.unwrap(), 1);
    // Nothing live is left for the user.
    assert_eq!(
        h.sessions.revoke_user_sessions(tenant.id, owner.id).await.unwrap(),
        0
    );
}
