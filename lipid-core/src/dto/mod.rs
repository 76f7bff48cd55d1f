//! Data Transfer Objects for inter-service communication
//!
//! Request and response bodies of the orchestrator API, plus the dispatch
//! message handed to workers.

pub mod job;
pub mod results;
pub mod upload;
pub mod viewer;
