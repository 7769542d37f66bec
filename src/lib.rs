//! Classification, typesetting and batch scheduling for math-tutoring
//! solution content.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
