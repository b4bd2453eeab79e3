// Audio module - click assets, real-time renderers and output stream hosting

pub mod click;
pub mod mixer;
pub mod output;

// Re-export commonly used types for convenience
pub use click::{generate_click_sample, load_click_wav, ClickSample, DecodedClick};
pub use mixer::{PulseMixer, RetriggerVoice, ScheduledPulse};
pub use output::{OutputStreamHost, StreamFormat};
