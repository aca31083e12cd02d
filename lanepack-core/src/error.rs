//! Error types for lanepack

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid bit width: {0} (supported: 1..=31)")]
    InvalidBitWidth(u8),

    #[error("Shape mismatch for {what}: expected {expected} elements, got {got}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Value {value} at index {index} does not fit in {bits} bits")]
    ValueOutOfRange { index: usize, value: u64, bits: u8 },

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Fail with `ShapeMismatch` unless `got == expected`
#[inline]
pub(crate) fn check_len(what: &'static str, expected: usize, got: usize) -> Result<()> {
    if expected == got {
        Ok(())
    } else {
        Err(Error::ShapeMismatch {
            what,
            expected,
            got,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            Error::InvalidBitWidth(32).to_string(),
            "Invalid bit width: 32 (supported: 1..=31)"
        );
        let err = Error::ShapeMismatch {
            what: "packed words",
            expected: 20,
            got: 19,
        };
        assert_eq!(
            err.to_string(),
            "Shape mismatch for packed words: expected 20 elements, got 19"
        );
        let err = Error::ValueOutOfRange {
            index: 3,
            value: 64,
            bits: 6,
        };
        assert_eq!(err.to_string(), "Value 64 at index 3 does not fit in 6 bits");
    }

    #[test]
    fn test_check_len() {
        assert!(check_len("values", 128, 128).is_ok());
        assert!(matches!(
            check_len("values", 128, 127),
            Err(Error::ShapeMismatch {
                expected: 128,
                got: 127,
                ..
            })
        ));
    }
}
