//! Infrastructure adapters: typesetting engine, headless document and telemetry.

pub mod error;
pub mod headless;
pub mod katex;
pub mod telemetry;
