//! Error types for the lenient JSON recovery pipeline
//!
//! Recovery is forgiving by design: most malformed input is repaired and
//! surfaced as warnings rather than errors. The variants here cover the two
//! cases where no dashboard can be produced at all.
//!
//! # Examples
//!
//! ```rust
//! use dashwright::errors::RepairError;
//!
//! let err = RepairError::Exhausted { length: 512 };
//! assert!(err.to_string().contains("512"));
//! ```

use thiserror::Error;

/// Errors from the JSON recovery pipeline
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepairError {
    /// Input was empty once think blocks were stripped and whitespace trimmed
    #[error("Empty response text")]
    EmptyInput,

    /// Every recovery strategy was tried and none produced parseable JSON
    #[error("Failed to extract valid JSON from response. Response length: {length} chars")]
    Exhausted {
        /// Length of the examined input, in characters
        length: usize,
    },
}

impl RepairError {
    /// True when the failure was an empty input rather than unparseable text
    pub fn is_empty_input(&self) -> bool {
        matches!(self, RepairError::EmptyInput)
    }
}
