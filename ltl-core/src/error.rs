//! Error types shared by every optimizer.
use thiserror::Error;

/// Fatal conditions raised by the codec, the optimizers and their configuration.
///
/// None of these are retried: an optimizer that returns one of them has not
/// mutated its state, and the caller is expected to abort the run.
#[derive(Error, Debug)]
pub enum LtlError {
    /// Malformed parameter record, fitness weights or config source
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An individual disagrees with the parameter spec used to encode it
    #[error("Shape mismatch for '{field}': expected {expected}, found {actual}")]
    ShapeMismatch {
        /// Field (or vector) that failed to match
        field: String,
        /// Shape declared by the spec
        expected: String,
        /// Shape found at runtime
        actual: String,
    },

    /// Results delivered to `post_process` do not cover the proposed batch exactly once
    #[error("Incomplete batch: {0}")]
    IncompleteBatch(String),

    /// `post_process` was called after the optimizer stopped
    #[error("Optimizer terminated after generation {0}")]
    Terminated(usize),
}

impl LtlError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        LtlError::Configuration(message.into())
    }

    /// Creates a shape mismatch error.
    pub fn shape(
        field: impl Into<String>,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        LtlError::ShapeMismatch {
            field: field.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Creates an incomplete batch error.
    pub fn incomplete(message: impl Into<String>) -> Self {
        LtlError::IncompleteBatch(message.into())
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, LtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_violation() {
        let err = LtlError::shape("coords", "[2]", "[3]");
        assert_eq!(
            err.to_string(),
            "Shape mismatch for 'coords': expected [2], found [3]"
        );

        let err = LtlError::incomplete("missing results for candidates [3]");
        assert!(err.to_string().starts_with("Incomplete batch"));
    }
}
