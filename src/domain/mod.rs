//! Domain layer types and invariants.

pub mod dom;
pub mod metadata;
pub mod types;
