//! Gatehouse Core: domain models, lifecycle state machines, error types,
//! and the storage traits the account service is written against.

pub mod error;
pub mod models;
pub mod repository;

pub use error::{GatehouseError, GatehouseResult};
