//! Subtitle input: validated speaker-tagged entries and an SRT reader.

/// Speaker-tagged subtitle entries.
pub mod entry;
/// SRT file reader.
pub mod srt;
