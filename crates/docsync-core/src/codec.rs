//! Transport-safe text encoding for update and state payloads
//!
//! Binary blobs travel over the channel as standard base64 (with padding).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Encode an arbitrary byte payload as base64 text
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode base64 text back into the original bytes
pub fn decode(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_arbitrary_bytes() {
        let payloads: [&[u8]; 4] = [b"", &[0x00], &[0xff, 0xfe, 0x00, 0x80, 0x7f], b"hello"];

        for payload in payloads {
            assert_eq!(decode(&encode(payload)).unwrap(), payload);
        }
    }

    #[test]
    fn test_round_trip_all_byte_values() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        assert_eq!(decode(&encode(&payload)).unwrap(), payload);
    }

    #[test]
    fn test_empty_payload_encodes_to_empty_text() {
        assert_eq!(encode(&[]), "");
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_input_is_rejected() {
        assert!(decode("not base64!").is_err());
    }
}
