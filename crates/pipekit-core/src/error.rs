//! Error types for PipeKit.

use serde::Serialize;
use thiserror::Error;

/// Every failure the assembly core can report.
///
/// All variants depend only on the declarative input, so the same input always
/// yields the same errors. None of them are retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Error {
    #[error("invalid {resource}: {message}")]
    Validation { resource: String, message: String },

    #[error("'{consumer}' requests access to unknown resource '{resource}'")]
    UnknownResource { consumer: String, resource: String },

    #[error("capability '{capability}' is not supported for {target}")]
    UnsupportedCapability { capability: String, target: String },

    #[error("invalid trigger on {resource}: {message}")]
    InvalidTrigger { resource: String, message: String },

    #[error("action '{stage}/{action}' consumes artifact '{artifact}' which no earlier stage produces")]
    DanglingArtifact {
        stage: String,
        action: String,
        artifact: String,
    },

    #[error("artifact '{artifact}' is produced by both '{first}' and '{second}'")]
    DuplicateArtifact {
        artifact: String,
        first: String,
        second: String,
    },
}

impl Error {
    pub fn validation(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn invalid_trigger(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidTrigger {
            resource: resource.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Collects validation failures so callers can report all of them at once.
#[derive(Debug, Default)]
pub struct Errors(Vec<Error>);

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: Error) {
        self.0.push(error);
    }

    /// Record the error of a failed result, keeping the success value.
    pub fn take<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.0.push(e);
                None
            }
        }
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = Error>) {
        self.0.extend(errors);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<Error> {
        self.0
    }

    /// `Ok(())` when nothing was recorded, otherwise every recorded error.
    pub fn finish(self) -> std::result::Result<(), Vec<Error>> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self.0)
        }
    }
}
