//! SurrealDB repository implementations.

mod invite;
mod member_event;
mod secondary_token;
mod session;
mod tenant;
mod user;

pub use invite::SurrealInviteRepository;
pub use member_event::SurrealMemberEventRepository;
pub use secondary_token::SurrealSecondaryTokenRepository;
pub use session::SurrealSessionRepository;
pub use tenant::SurrealTenantRepository;
pub use user::SurrealUserRepository;

use std::str::FromStr;

use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_uuid(value: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::Decode(format!("invalid {what} UUID: {e}")))
}

fn parse_opt_uuid(value: Option<&str>, what: &str) -> Result<Option<Uuid>, DbError> {
    value.map(|v| parse_uuid(v, what)).transpose()
}

/// Parse a stored enum string through its `FromStr` impl.
fn parse_enum<T: FromStr>(value: &str, what: &str) -> Result<T, DbError> {
    value
        .parse()
        .map_err(|_| DbError::Decode(format!("unknown {what}: {value}")))
}
