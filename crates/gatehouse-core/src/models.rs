//! Domain models for Gatehouse.
//!
//! These are the core types shared across all crates.

pub mod invite;
pub mod member_event;
pub mod secondary_token;
pub mod session;
pub mod tenant;
pub mod user;
