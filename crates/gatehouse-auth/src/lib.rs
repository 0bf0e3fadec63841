//! Gatehouse Auth: credentials, token signing and rotation, invites,
//! the join workflow, and member administration.
//!
//! Every workflow returns a closed outcome enum for expected business
//! results. `GatehouseError` is reserved for infrastructure faults.

pub mod config;
pub mod credential;
pub mod error;
pub mod invite;
pub mod join;
pub mod login;
pub mod mailer;
pub mod member;
pub mod password;
pub mod recovery;
pub mod secondary;
pub mod session;
pub mod tenant_directory;
pub mod token;

pub use config::AuthConfig;
pub use credential::{ChangePasswordOutcome, CredentialStore, VerifyOutcome};
pub use error::AuthError;
pub use invite::{CreatedInvite, InviteCreateOutcome, InviteLedger, InviteListOutcome, InviteRevokeOutcome};
pub use join::{JoinInput, JoinOutcome, JoinWorkflow, SignupInput, SignupOutcome};
pub use login::{LoginFlow, LoginOutcome};
pub use mailer::{Links, LogMailer, Mailer, OutboundEmail, SendOutcome};
pub use member::{
    ApproveOutcome, EventListOutcome, MemberRegistry, RejectOutcome, RemoveOutcome,
    RoleChangeOutcome,
};
pub use recovery::AccountRecovery;
pub use secondary::{
    ConsumeOutcome, IssuedToken, ResetPasswordOutcome, SecondaryTokenIssuer, VerifyEmailOutcome,
};
pub use session::{RefreshOutcome, SessionManager, TokenSet};
pub use tenant_directory::{CreateTenantOutcome, ResolveOutcome, TenantDirectory};
pub use token::{TokenClaims, TokenCodec, TokenKind, VerifiedToken};
