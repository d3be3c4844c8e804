//! Shared domain types for snkmt.
//!
//! This crate contains the types exchanged across the snkmt persistence
//! boundary: status enums, the DTOs exposed by the repository, the database
//! schema version type, and the associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod dto;
pub mod enums;
pub mod error;
pub mod version;
