//! Repository compliance server library.
//!
//! Audits an organization's repositories against configured compliance policies and
//! remediates violations through the GitHub API.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod services;
