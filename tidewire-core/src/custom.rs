//! Opt-in mapping of request errors to domain errors.
//!
//! Nothing here runs automatically. A repository that knows its API's error
//! vocabulary builds a [`CustomErrorMap`] and chains
//! [`ResultExt::map_custom_error`] onto its results.

use std::sync::Arc;

use crate::error::{RepositoryError, ResponseError};

/// Domain error that a request error can be rewritten into.
pub trait CustomRepositoryError: std::error::Error + Send + Sync + 'static {
    /// Display name of the error.
    fn name(&self) -> String;
}

/// What a table entry matches against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorMatcher {
    /// An exact HTTP status code.
    Status(u16),
    /// A substring of the diagnostic message or body.
    Contains(String),
}

/// Ordered table of `{matcher -> custom error}` entries.
#[derive(Debug, Clone, Default)]
pub struct CustomErrorMap {
    entries: Vec<(ErrorMatcher, Arc<dyn CustomRepositoryError>)>,
}

impl CustomErrorMap {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps a status code to a custom error.
    pub fn with_status(mut self, status: u16, error: impl CustomRepositoryError) -> Self {
        self.entries.push((ErrorMatcher::Status(status), Arc::new(error)));
        self
    }

    /// Maps a message substring to a custom error.
    pub fn with_message(mut self, needle: impl Into<String>, error: impl CustomRepositoryError) -> Self {
        self.entries.push((ErrorMatcher::Contains(needle.into()), Arc::new(error)));
        self
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds the custom error for a response error.
    ///
    /// Exact status codes are checked first. Otherwise the first entry whose
    /// text (a status entry's code as decimal, or a substring entry's
    /// needle) occurs in the diagnostic message wins.
    pub fn lookup(&self, error: &ResponseError) -> Option<&Arc<dyn CustomRepositoryError>> {
        if let Some(status) = error.status {
            let exact = self
                .entries
                .iter()
                .find(|(matcher, _)| *matcher == ErrorMatcher::Status(status));
            if let Some((_, custom)) = exact {
                return Some(custom);
            }
        }

        let diagnostic = error.diagnostic();
        self.entries
            .iter()
            .find(|(matcher, _)| match matcher {
                ErrorMatcher::Status(code) => diagnostic.contains(&code.to_string()),
                ErrorMatcher::Contains(needle) => diagnostic.contains(needle.as_str()),
            })
            .map(|(_, custom)| custom)
    }
}

impl RepositoryError {
    /// Rewrites a request error into a custom error when the table matches.
    ///
    /// Every other variant, and an unmatched request error, is returned
    /// unchanged.
    pub fn map_custom_error(self, errors: &CustomErrorMap) -> Self {
        if let RepositoryError::Request(ref response) = self {
            if let Some(custom) = errors.lookup(response) {
                return RepositoryError::Custom {
                    name: custom.name(),
                    error: Arc::clone(custom),
                };
            }
        }
        self
    }
}

/// Chains the custom error mapping onto a repository result.
pub trait ResultExt<T> {
    /// Applies [`RepositoryError::map_custom_error`] to the error branch.
    fn map_custom_error(self, errors: &CustomErrorMap) -> Result<T, RepositoryError>;
}

impl<T> ResultExt<T> for Result<T, RepositoryError> {
    fn map_custom_error(self, errors: &CustomErrorMap) -> Result<T, RepositoryError> {
        self.map_err(|e| e.map_custom_error(errors))
    }
}

// ============================================================================
// Tests
// ============================================================================
