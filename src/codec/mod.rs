/// IR code conversion
///
/// Turns device captures (base64 wire codes) into interchange hex text.
/// Everything here is pure and synchronous; `IrCodec` carries no state and
/// can be copied freely between tasks.

pub mod capture;
pub mod interchange;

pub use capture::{Timing, DEFAULT_FREQUENCY, IR_CAPTURE_MARKER};
pub use interchange::{DEFAULT_FREQUENCY_WORD, INTERCHANGE_FREQUENCY_CONSTANT};

use crate::error::{IrError, Result};
use serde::{Deserialize, Serialize};

/// A wire code together with everything derived from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertedCode {
    pub wire_code: String,
    pub interchange_code: String,
    pub frequency: u32,
}

/// Stateless encoder/decoder between wire codes and interchange text
#[derive(Debug, Clone, Copy, Default)]
pub struct IrCodec;

impl IrCodec {
    pub fn new() -> Self {
        Self
    }

    /// Decode wire text into capture bytes
    pub fn decode_wire(&self, text: &str) -> Result<Vec<u8>> {
        capture::decode_wire(text)
    }

    /// Encode capture bytes as wire text
    pub fn encode_wire(&self, bytes: &[u8]) -> String {
        capture::encode_wire(bytes)
    }

    /// Extract timings (microseconds) and carrier from capture bytes
    pub fn parse_capture(&self, data: &[u8]) -> Result<(Vec<Timing>, u32)> {
        capture::parse_capture(data)
    }

    /// Format timings as interchange hex text
    pub fn timings_to_interchange(&self, timings: &[Timing], frequency: u32) -> Result<String> {
        interchange::timings_to_interchange(timings, frequency)
    }

    /// Convert a wire code to interchange hex text
    ///
    /// Any stage failing yields [`IrError::Conversion`] wrapping that
    /// stage's error.
    pub fn encode(&self, wire_code: &str) -> Result<String> {
        let data = self.decode_wire(wire_code).map_err(IrError::conversion)?;
        let (timings, frequency) = self.parse_capture(&data).map_err(IrError::conversion)?;

        self.timings_to_interchange(&timings, frequency)
            .map_err(IrError::conversion)
    }

    /// Convert a wire code and read back its carrier frequency
    pub fn convert(&self, wire_code: &str) -> Result<ConvertedCode> {
        let interchange_code = self.encode(wire_code)?;
        let frequency = self.frequency_of(&interchange_code);

        Ok(ConvertedCode {
            wire_code: wire_code.to_string(),
            interchange_code,
            frequency,
        })
    }

    /// Structural check of interchange text; never fails
    pub fn validate_interchange(&self, text: &str) -> bool {
        interchange::validate_interchange(text)
    }

    /// Carrier frequency of interchange text, 38 kHz when unreadable
    pub fn frequency_of(&self, text: &str) -> u32 {
        interchange::frequency_of(text)
    }
}
