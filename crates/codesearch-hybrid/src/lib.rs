//! Hybrid code search: rank fusion and the `CodeSearch` façade.

pub mod engine;
pub mod fusion;
pub mod overlay;

pub use engine::{CodeSearch, IndexReport};
pub use fusion::{fuse, FusionConfig};
pub use overlay::KeywordOverlay;
