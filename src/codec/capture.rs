// Capture-format side of the codec.
//
// A wire code is base64 text (optionally prefixed with "b64:") wrapping the
// bytes the learning device hands back. Those bytes are a marker, a length
// field and a run of little-endian 16-bit tick counts.

use crate::error::{IrError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};

/// Optional prefix some tools put in front of the base64 text
pub const WIRE_PREFIX: &str = "b64:";

/// First byte of every IR capture
pub const IR_CAPTURE_MARKER: u8 = 0x26;

/// Two bytes that may close the timing payload
pub const CAPTURE_TRAILER: [u8; 2] = [0x0d, 0x05];

/// Carrier assumed for every capture; the format does not carry one
pub const DEFAULT_FREQUENCY: u32 = 38_000;

const HEADER_LEN: usize = 4;

/// One mark or space interval in microseconds
pub type Timing = u32;

/// Decode wire text into raw capture bytes
///
/// Whitespace anywhere in the text is ignored, so codes pasted with line
/// wrapping still decode.
pub fn decode_wire(text: &str) -> Result<Vec<u8>> {
    let text = text.trim();
    let body: String = text
        .strip_prefix(WIRE_PREFIX)
        .unwrap_or(text)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    STANDARD
        .decode(body.as_bytes())
        .map_err(|e| IrError::Format(format!("invalid base64 wire code: {}", e)))
}

/// Encode raw capture bytes as wire text (no prefix)
pub fn encode_wire(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Extract the timing sequence from capture bytes
///
/// Returns the timings in microseconds together with the carrier frequency,
/// which is always [`DEFAULT_FREQUENCY`].
pub fn parse_capture(data: &[u8]) -> Result<(Vec<Timing>, u32)> {
    if data.len() < HEADER_LEN {
        return Err(IrError::Format(format!(
            "capture is {} bytes, need at least {}",
            data.len(),
            HEADER_LEN
        )));
    }

    if data[0] != IR_CAPTURE_MARKER {
        return Err(IrError::Format(format!(
            "not an IR capture (marker 0x{:02x})",
            data[0]
        )));
    }

    let mut length = u16::from_le_bytes([data[2], data[3]]) as usize;

    if data.len() >= length + HEADER_LEN && data[length + 2..length + 4] == CAPTURE_TRAILER {
        length = length.saturating_sub(2);
    }

    // Short captures are read as far as they go
    let end = (HEADER_LEN + length).min(data.len());
    let timings = data[HEADER_LEN..end]
        .chunks_exact(2)
        .map(|unit| ticks_to_us(u16::from_le_bytes([unit[0], unit[1]])))
        .collect();

    Ok((timings, DEFAULT_FREQUENCY))
}

/// Device ticks are 269/8 microseconds long
fn ticks_to_us(ticks: u16) -> Timing {
    ticks as u32 * 269 / 8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_wire_strips_prefix() {
        let plain = decode_wire("JgAEABoAKwA=").unwrap();
        let prefixed = decode_wire("b64:JgAEABoAKwA=").unwrap();

        assert_eq!(plain, prefixed);
        assert_eq!(plain, vec![0x26, 0x00, 0x04, 0x00, 0x1a, 0x00, 0x2b, 0x00]);
    }

    #[test]
    fn test_decode_wire_accepts_wrapped_text() {
        let wrapped = decode_wire("JgAEABoA\nKwA=").unwrap();
        let spaced = decode_wire("b64:JgAE ABoA\r\n\tKwA=\n").unwrap();

        assert_eq!(wrapped, vec![0x26, 0x00, 0x04, 0x00, 0x1a, 0x00, 0x2b, 0x00]);
        assert_eq!(spaced, wrapped);
    }

    #[test]
    fn test_decode_wire_rejects_garbage() {
        match decode_wire("not base64!!") {
            Err(IrError::Format(_)) => {}
            other => panic!("Expected Format error, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_wire_inverts_decode() {
        let bytes = vec![0x26, 0x00, 0x06, 0x00, 0x1a, 0x00, 0x2b, 0x00, 0x0d, 0x05];
        let text = encode_wire(&bytes);
        assert_eq!(text, "JgAGABoAKwANBQ==");
        assert_eq!(decode_wire(&text).unwrap(), bytes);
    }

    #[test]
    fn test_parse_two_units() {
        let data = [0x26, 0x00, 0x04, 0x00, 0x1a, 0x00, 0x2b, 0x00];
        let (timings, frequency) = parse_capture(&data).unwrap();

        assert_eq!(timings, vec![0x1a * 269 / 8, 0x2b * 269 / 8]);
        assert_eq!(timings, vec![874, 1445]);
        assert_eq!(frequency, 38_000);
    }

    #[test]
    fn test_parse_drops_trailer() {
        // length 6 covers two units plus the 0x0d 0x05 trailer
        let data = [0x26, 0x00, 0x06, 0x00, 0x1a, 0x00, 0x2b, 0x00, 0x0d, 0x05];
        let (timings, _) = parse_capture(&data).unwrap();
        assert_eq!(timings, vec![874, 1445]);
    }

    #[test]
    fn test_parse_drops_odd_byte() {
        let data = [0x26, 0x00, 0x03, 0x00, 0x1a, 0x00, 0x2b];
        let (timings, _) = parse_capture(&data).unwrap();
        assert_eq!(timings, vec![874]);
    }

    #[test]
    fn test_parse_truncated_payload() {
        // length claims 8 bytes but only 2 follow the header
        let data = [0x26, 0x00, 0x08, 0x00, 0x1a, 0x00];
        let (timings, _) = parse_capture(&data).unwrap();
        assert_eq!(timings, vec![874]);
    }

    #[test]
    fn test_parse_too_short() {
        for data in [&[][..], &[0x26][..], &[0x26, 0x00, 0x04][..]] {
            match parse_capture(data) {
                Err(IrError::Format(_)) => {}
                other => panic!("Expected Format error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_parse_wrong_marker() {
        let data = [0xb2, 0x00, 0x04, 0x00, 0x1a, 0x00, 0x2b, 0x00];
        match parse_capture(&data) {
            Err(IrError::Format(msg)) => assert!(msg.contains("not an IR capture")),
            other => panic!("Expected Format error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_real_capture() {
        let data = decode_wire("JgAcAB0dHB44HhweGx4cHR06HB0cHhwdHB8bHhwADQUAAAAAAAAAAAAAAAA=")
            .unwrap();
        let (timings, _) = parse_capture(&data).unwrap();

        assert_eq!(timings.len(), 13);
        assert_eq!(timings[0], 250_607);
        assert_eq!(timings[12], 941);
    }
}
