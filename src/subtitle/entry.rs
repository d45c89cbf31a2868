use crate::foundation::error::{ReelError, ReelResult};

/// One speaker-tagged subtitle line.
///
/// Constructed through [`SubtitleEntry::new`] or [`SubtitleEntry::from_raw`], both of which
/// enforce `end_ms > start_ms` and non-empty speaker/text. Deserialization goes through the
/// same checks.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "SubtitleRecord")]
pub struct SubtitleEntry {
    start_ms: u64,
    end_ms: u64,
    speaker: String,
    text: String,
}

/// Unvalidated wire shape of [`SubtitleEntry`].
#[derive(serde::Deserialize)]
struct SubtitleRecord {
    start_ms: u64,
    end_ms: u64,
    speaker: String,
    text: String,
}

impl TryFrom<SubtitleRecord> for SubtitleEntry {
    type Error = ReelError;

    /// Position 0: a lone record has no place in a subtitle list.
    fn try_from(r: SubtitleRecord) -> Result<Self, Self::Error> {
        Self::new(0, r.start_ms, r.end_ms, r.speaker, r.text)
    }
}

impl SubtitleEntry {
    /// Build an entry from already-separated speaker and text.
    ///
    /// `position` is the 1-based position used in error messages.
    pub fn new(
        position: usize,
        start_ms: u64,
        end_ms: u64,
        speaker: impl Into<String>,
        text: impl Into<String>,
    ) -> ReelResult<Self> {
        if end_ms <= start_ms {
            return Err(ReelError::input(
                position,
                format!("end time {end_ms} ms must be after start time {start_ms} ms"),
            ));
        }
        let speaker = speaker.into().trim().to_string();
        if speaker.is_empty() {
            return Err(ReelError::input(position, "speaker tag is empty"));
        }
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Err(ReelError::input(position, "subtitle text is empty"));
        }
        Ok(Self {
            start_ms,
            end_ms,
            speaker,
            text,
        })
    }

    /// Build an entry from raw text of the form `[Speaker] text`.
    pub fn from_raw(position: usize, start_ms: u64, end_ms: u64, raw: &str) -> ReelResult<Self> {
        let (speaker, text) = split_speaker_tag(raw).ok_or_else(|| {
            ReelError::input(
                position,
                format!("missing '[Speaker]' tag at the start of '{}'", raw.trim()),
            )
        })?;
        Self::new(position, start_ms, end_ms, speaker, text)
    }

    /// Start time in milliseconds.
    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }

    /// End time in milliseconds (exclusive).
    pub fn end_ms(&self) -> u64 {
        self.end_ms
    }

    /// Speaker name from the bracketed prefix.
    pub fn speaker(&self) -> &str {
        &self.speaker
    }

    /// Subtitle text with the prefix removed.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Split `[Speaker] text` into its parts. Returns `None` without a leading tag.
pub fn split_speaker_tag(raw: &str) -> Option<(&str, &str)> {
    let rest = raw.trim_start().strip_prefix('[')?;
    let close = rest.find(']')?;
    let speaker = rest[..close].trim();
    if speaker.is_empty() {
        return None;
    }
    Some((speaker, rest[close + 1..].trim()))
}
