//! SQLite infrastructure for snkmt.
//!
//! Implements the repository trait defined in `snkmt-core` over sqlx with
//! split read/write pools, and owns the database lifecycle: file creation,
//! schema-version detection, backup-before-migrate, and the ordered
//! migration engine.
//!
//! Two connectors share the same pool type but have different authority:
//! [`connector::Database`] is the sole migration executor, while
//! [`async_connector::AsyncDatabase`] serves concurrent writer tasks and
//! refuses to operate on an outdated schema.

pub mod async_connector;
pub mod connector;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod schema;
