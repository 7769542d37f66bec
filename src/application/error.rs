use std::error::Error as StdError;

use thiserror::Error;

use crate::{config::LoadError, infra::error::InfraError};

/// Flattened error chain, logged by the binary before it exits.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit code for the diagnostics binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) | AppError::Validation(_) => 2,
            AppError::Infra(_) | AppError::Unexpected(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_walks_the_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "fixture.json");
        let err = AppError::from(InfraError::from(io));

        let report = ErrorReport::from_error("main", &err);

        assert_eq!(report.messages[0], "io error: fixture.json");
        assert_eq!(err.exit_code(), 1);
    }
}
