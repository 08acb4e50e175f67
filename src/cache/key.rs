//! Key Validation
//!
//! Rules applied to keys on every write path of the facade.

use crate::error::{CacheError, Result};

/// Characters that may not appear in a key.
pub const RESERVED_KEY_CHARS: &str = "@{}()/\\";

/// Maximum key length in characters (Unicode code points).
pub const MAX_KEY_LENGTH: usize = 64;

// == Validate Key ==
/// Rejects keys containing a reserved character or longer than
/// [`MAX_KEY_LENGTH`] characters.
pub fn validate_key(key: &str) -> Result<()> {
    if key.contains(|c: char| RESERVED_KEY_CHARS.contains(c)) {
        return Err(CacheError::invalid_argument(format!(
            "Invalid key \"{}\" provided; cannot contain any of ({})",
            key, RESERVED_KEY_CHARS
        )));
    }

    if key.chars().count() > MAX_KEY_LENGTH {
        return Err(CacheError::invalid_argument(format!(
            "Invalid key \"{}\" provided; key is too long. Must be no more than {} characters",
            key, MAX_KEY_LENGTH
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_keys_are_valid() {
        for key in ["a", "user:42", "with space", "dots.and-dashes_", "ümlaut", ""] {
            assert!(validate_key(key).is_ok(), "{key} should be valid");
        }
    }

    #[test]
    fn test_each_reserved_char_is_rejected() {
        for c in RESERVED_KEY_CHARS.chars() {
            let key = format!("a{c}b");
            let err = validate_key(&key).unwrap_err();
            assert!(err.is_invalid_argument());
            assert!(err.to_string().contains("cannot contain"));
        }
    }

    #[test]
    fn test_length_counts_code_points() {
        // 64 two-byte characters are 128 bytes but still within the limit
        let at_limit = "é".repeat(MAX_KEY_LENGTH);
        assert!(validate_key(&at_limit).is_ok());

        let over = "é".repeat(MAX_KEY_LENGTH + 1);
        let err = validate_key(&over).unwrap_err();
        assert!(err.to_string().contains("too long"));

        assert!(validate_key(&"x".repeat(MAX_KEY_LENGTH + 1)).is_err());
    }
}
