/// Interchange hex side of the codec
///
/// Learned codes are written as space separated 4-digit hex words:
/// `0000 <freq> 0000 <count> <timing>...`. Frequency words are the
/// reciprocal of the carrier, scaled by [`INTERCHANGE_FREQUENCY_CONSTANT`].

use crate::codec::capture::{Timing, DEFAULT_FREQUENCY};
use crate::error::{IrError, Result};

/// Preamble word marking a learned (raw) code
pub const LEARNED_CODE_WORD: &str = "0000";

/// Frequency word written for the default 38 kHz carrier
pub const DEFAULT_FREQUENCY_WORD: u32 = 0x0073;

/// Divided by the carrier in Hz to get the frequency word (and back)
pub const INTERCHANGE_FREQUENCY_CONSTANT: u32 = 4_145_146;

const MAX_WORD: u64 = 0xFFFF;
const PREAMBLE_WORDS: usize = 4;

/// Format a timing sequence as interchange hex text
pub fn timings_to_interchange(timings: &[Timing], frequency: u32) -> Result<String> {
    if timings.is_empty() {
        return Err(IrError::Format("timing list is empty".to_string()));
    }

    let frequency_word = frequency_word(frequency)?;

    if timings.len() as u64 > MAX_WORD {
        return Err(IrError::Format(format!(
            "{} timings do not fit in one code",
            timings.len()
        )));
    }

    let mut words = Vec::with_capacity(PREAMBLE_WORDS + timings.len());
    words.push(LEARNED_CODE_WORD.to_string());
    words.push(format!("{:04X}", frequency_word));
    words.push(LEARNED_CODE_WORD.to_string());
    words.push(format!("{:04X}", timings.len()));

    for &timing in timings {
        words.push(format!("{:04X}", us_to_cycles(timing, frequency)));
    }

    Ok(words.join(" "))
}

/// Structural check of interchange text
///
/// Never fails: anything malformed is simply `false`.
pub fn validate_interchange(text: &str) -> bool {
    let words: Vec<&str> = text.split_whitespace().collect();

    if words.len() < PREAMBLE_WORDS || words[0] != LEARNED_CODE_WORD {
        return false;
    }

    words
        .iter()
        .all(|word| word.len() == 4 && word.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Carrier frequency in Hz read from the second word
///
/// Falls back to 38 kHz whenever the word is missing or unreadable.
pub fn frequency_of(text: &str) -> u32 {
    let word = text
        .split_whitespace()
        .nth(1)
        .and_then(|word| u32::from_str_radix(word, 16).ok());

    match word {
        Some(DEFAULT_FREQUENCY_WORD) => DEFAULT_FREQUENCY,
        Some(value) if value > 0 => div_round(INTERCHANGE_FREQUENCY_CONSTANT as u64, value as u64) as u32,
        _ => DEFAULT_FREQUENCY,
    }
}

fn frequency_word(frequency: u32) -> Result<u32> {
    if frequency == DEFAULT_FREQUENCY {
        return Ok(DEFAULT_FREQUENCY_WORD);
    }
    if frequency == 0 {
        return Err(IrError::Format("carrier frequency must be positive".to_string()));
    }

    let word = div_round(INTERCHANGE_FREQUENCY_CONSTANT as u64, frequency as u64);
    if word == 0 || word > MAX_WORD {
        return Err(IrError::Format(format!(
            "carrier frequency {} Hz cannot be expressed",
            frequency
        )));
    }

    Ok(word as u32)
}

/// Microseconds to carrier cycles, clamped to one word
fn us_to_cycles(timing: Timing, frequency: u32) -> u64 {
    div_round(timing as u64 * frequency as u64, 1_000_000).min(MAX_WORD)
}

// Round half up; all operands are non-negative
fn div_round(numerator: u64, denominator: u64) -> u64 {
    (numerator + denominator / 2) / denominator
}
