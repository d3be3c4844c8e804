//! Repository traits and the schema-version catalog for snkmt.
//!
//! This crate defines the "ports" that the infrastructure layer implements.
//! It depends only on `snkmt-types` -- never on `snkmt-db` or any
//! database/IO crate.

pub mod catalog;
pub mod repository;
