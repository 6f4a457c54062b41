//! Core domain types and utilities for the querydeck platform.
//!
//! This crate provides the identifier types and error-handling foundation
//! shared by the access-control, instrumentation, and server crates.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ParseIdError, ProjectId, QueryHistoryId, UserId};
