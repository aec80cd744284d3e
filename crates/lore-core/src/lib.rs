//! Lore Core - Domain types shared by the ingestion pipeline and its front ends.

mod error;
mod types;

pub use error::{Error, Result};
pub use types::*;
