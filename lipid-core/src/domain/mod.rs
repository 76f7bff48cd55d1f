//! Core domain types
//!
//! This module contains the core domain structures used across Lipid services.
//! These types represent the fundamental business entities and are shared between
//! orchestrator (for persistence) and runner (for progress updates).

pub mod image;
pub mod job;
