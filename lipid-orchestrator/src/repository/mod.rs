//! Repository Module
//!
//! Postgres adapters for the Job Store and Image Store capabilities.

pub mod image;
pub mod job;

pub use image::PgImageStore;
pub use job::PgJobStore;

use lipid_core::store::StoreError;

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(Box::new(err))
}
