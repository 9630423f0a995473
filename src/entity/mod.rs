//! SeaORM entity definitions for PostgreSQL database.

pub mod action_log;
pub mod policy;
pub mod policy_violation;
pub mod repository;
pub mod scan;
