//! codesearch-text
//!
//! Tantivy-based keyword index over chunk text, used as an alternative to the
//! substring scan for the keyword signal.

pub mod index;
pub mod tantivy_utils;

pub use index::TantivyKeywordIndex;
