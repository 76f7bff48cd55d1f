//! Lipid Core
//!
//! Core types and abstractions for the Lipid slide-analysis job system.
//!
//! This crate contains:
//! - Domain types: Job document, status machine and merge reducer, Image
//! - DTOs: Data transfer objects for inter-service communication
//! - Store traits: the Job Store and Image Store capabilities, with in-memory implementations
//! - Storage URIs: `gs://bucket/path` parsing

pub mod domain;
pub mod dto;
pub mod error;
pub mod storage;
pub mod store;
