// Error types for the metronome core
//
// A single `AudioError` enum is shared by the schedulers, the backends, the
// control thread and the FFI surface. Every variant maps to a stable numeric
// code so Dart can branch on failures without parsing messages.

mod audio;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};

/// Numeric code plus display message for errors crossing the FFI boundary
pub trait ErrorCode {
    /// Stable code from `AudioErrorCodes`
    fn code(&self) -> i32;

    /// Message suitable for logs and UI
    fn message(&self) -> String;
}
