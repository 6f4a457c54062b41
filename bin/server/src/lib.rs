//! querydeck web server.
//!
//! Serves the authentication routes and the guarded API over Postgres-backed
//! accounts, sessions, and projects.

pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod query;

pub use app::router;
