//! Hex and display helpers shared by the components.

use alloy::primitives::Address;

/// Renders bytes as a lowercase, zero-padded, `0x`-prefixed hex string.
///
/// This is the form handles and input proofs take as transaction arguments.
pub fn to_hex_string(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Inverse of [`to_hex_string`]. The `0x` prefix is optional.
pub fn from_hex_string(value: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(digits)
}

/// `0x1234...abcd` style label: first six and last four characters of the
/// checksummed address.
pub fn short_address(address: &Address) -> String {
    let full = address.to_checksum(None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn test_hex_is_lowercase_and_padded() {
        assert_eq!(to_hex_string(&[0x00, 0x0a, 0xff, 0xAB]), "0x000affab");
    }

    #[test]
    fn test_empty_input_renders_prefix_only() {
        assert_eq!(to_hex_string(&[]), "0x");
    }

    #[test]
    fn test_hex_round_trip_keeps_zero_bytes() {
        let samples: [&[u8]; 4] = [&[0], &[0, 0, 0], &[1, 0, 2, 0], &[0xde, 0xad, 0x00, 0xbe, 0xef]];
        for bytes in samples {
            let encoded = to_hex_string(bytes);
            assert_eq!(from_hex_string(&encoded).unwrap(), bytes.to_vec());
        }
    }

    #[test]
    fn test_from_hex_rejects_garbage() {
        assert!(from_hex_string("0xzz").is_err());
        assert!(from_hex_string("0x123").is_err());
    }

    #[test]
    fn test_short_address() {
        let account = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
        assert_eq!(short_address(&account), "0x5FbD...0aa3");
    }
}
