//! Seed truncation
//!
//! The on-chain mint seed is a 32-byte hash. The render harness consumes an
//! integer seed, produced by zero-padding the hash to 64 hex digits and
//! parsing the first [`SEED_HEX_PREFIX_LEN`] digits as a `u64`. The same
//! function runs on the publishing side (custom seeds) and the consuming
//! side; if the two ever disagree, previews and finals render differently.

use crate::error::ChainError;

/// Number of leading hex digits of the padded hash that become the seed
pub const SEED_HEX_PREFIX_LEN: usize = 16;

/// Width of the zero-padded hex representation of the seed hash
pub const SEED_HASH_HEX_WIDTH: usize = 64;

/// Truncate a hash-derived seed into the harness's integer domain.
///
/// Accepts the hash with or without a `0x` prefix, in either case. The hash
/// is left-padded with zeros to 64 digits before the prefix is taken, so
/// short representations of small values truncate identically to their
/// padded form.
///
/// # Errors
///
/// Returns [`ChainError::InvalidSeedHash`] if the input is longer than 64
/// hex digits or contains non-hex characters.
pub fn truncate_seed_hash(hash: &str) -> Result<u64, ChainError> {
    let digits = hash.strip_prefix("0x").unwrap_or(hash).to_ascii_lowercase();

    if digits.len() > SEED_HASH_HEX_WIDTH {
        return Err(ChainError::InvalidSeedHash(format!(
            "expected at most {SEED_HASH_HEX_WIDTH} hex digits, got {}",
            digits.len()
        )));
    }
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ChainError::InvalidSeedHash(format!(
            "not a hex string: {hash:?}"
        )));
    }

    let mut padded = "0".repeat(SEED_HASH_HEX_WIDTH - digits.len());
    padded.push_str(&digits);
    u64::from_str_radix(&padded[..SEED_HEX_PREFIX_LEN], 16)
        .map_err(|e| ChainError::InvalidSeedHash(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_known_hash() {
        let hash = format!("0x0000019a81cbbbfe{}", "a".repeat(48));
        assert_eq!(truncate_seed_hash(&hash).unwrap(), 1_763_114_204_158);
    }

    #[test]
    fn pads_short_values() {
        // A short hash truncates identically to its zero-padded form.
        assert_eq!(truncate_seed_hash("0x2a").unwrap(), 0);
        let full = format!("0x{}2a", "0".repeat(62));
        assert_eq!(
            truncate_seed_hash("0x2a").unwrap(),
            truncate_seed_hash(&full).unwrap()
        );
    }

    #[test]
    fn prefix_takes_high_order_digits() {
        let hash = format!("0xffffffffffffffff{}", "0".repeat(48));
        assert_eq!(truncate_seed_hash(&hash).unwrap(), u64::MAX);
    }

    #[test]
    fn case_insensitive() {
        let lower = format!("0x0000019a81cbbbfe{}", "0".repeat(48));
        let upper = lower.to_uppercase().replace("0X", "0x");
        assert_eq!(
            truncate_seed_hash(&lower).unwrap(),
            truncate_seed_hash(&upper).unwrap()
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(truncate_seed_hash("0xzz").is_err());
        assert!(truncate_seed_hash("").is_err());
        assert!(truncate_seed_hash(&"f".repeat(65)).is_err());
    }
}
