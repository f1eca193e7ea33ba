//! Error taxonomy for the kernels.
//!
//! Only configuration and data-shape problems are errors. Numeric edge cases
//! (warm-up windows, missing values, bankruptcy) are handled inside the bar
//! loops and never surface here.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum KernelError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("unknown {kind} `{value}`, expected one of: {expected}")]
    UnknownVariant {
        kind: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("filter set must contain exactly 4 series (long_open, long_stop, short_open, short_stop), got {0}")]
    FilterArity(usize),

    #[error("length mismatch: `{name}` has {actual} rows, expected {expected}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl KernelError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Fail fast when a companion series does not line up with the driving series.
pub(crate) fn check_len(name: &'static str, expected: usize, actual: usize) -> Result<(), KernelError> {
    if expected != actual {
        return Err(KernelError::LengthMismatch {
            name,
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_len_accepts_equal_lengths() {
        assert!(check_len("close", 5, 5).is_ok());
    }

    #[test]
    fn check_len_names_offending_series() {
        let err = check_len("close", 5, 4).unwrap_err();
        assert_eq!(
            err,
            KernelError::LengthMismatch {
                name: "close",
                expected: 5,
                actual: 4
            }
        );
        assert!(err.to_string().contains("`close`"));
    }

    #[test]
    fn invalid_parameter_message() {
        let err = KernelError::invalid("window", "must be >= 1");
        assert_eq!(err.to_string(), "invalid parameter `window`: must be >= 1");
    }
}
