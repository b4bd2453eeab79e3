//! Tempo text entry boundary.
//!
//! Raw text from the UI is turned into a `Tempo` before it reaches the
//! controller. Numbers outside 1-300 BPM are clamped; text that is not an
//! integer is rejected so the caller keeps the previous tempo.

use log::debug;

use crate::scheduler::{Tempo, MAX_BPM, MIN_BPM};

/// Parse user-entered tempo text.
///
/// # Returns
/// - `Some(tempo)` for any integer, clamped to 1-300 BPM
/// - `None` for empty or non-integer input
pub fn parse_tempo_input(raw: &str) -> Option<Tempo> {
    let trimmed = raw.trim();

    match trimmed.parse::<i64>() {
        Ok(value) => Some(Tempo::clamped(value)),
        Err(_) if is_integer_literal(trimmed) => {
            // Too large for i64: clamp by sign
            let bpm = if trimmed.starts_with('-') { MIN_BPM } else { MAX_BPM };
            Some(Tempo::clamped(bpm as i64))
        }
        Err(_) => {
            debug!("[TempoInput] Rejected non-numeric input {:?}", raw);
            None
        }
    }
}

fn is_integer_literal(text: &str) -> bool {
    let digits = text
        .strip_prefix('-')
        .or_else(|| text.strip_prefix('+'))
        .unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
