//! Shared building blocks for the code search workspace: domain types, the
//! error taxonomy, configuration, backend traits, the chunker and corpus I/O.

pub mod chunker;
pub mod config;
pub mod corpus;
pub mod error;
pub mod traits;
pub mod types;

pub use chunker::Chunker;
pub use error::{Error, Result};
