//! service-core: shared infrastructure for the identity workspace.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
