//! Minimal SRT reader for speaker-tagged subtitle files.
//!
//! Expected block shape:
//!
//! ```text
//! 1
//! 00:00:00,000 --> 00:00:04,500
//! [Host] Welcome to our podcast!
//! ```
//!
//! Multi-line text is joined with single spaces. Styling tags and positioning hints are not
//! interpreted.

use std::path::Path;

use anyhow::Context as _;

use crate::foundation::error::{ReelError, ReelResult};
use crate::subtitle::entry::SubtitleEntry;

/// Read and parse an SRT file.
pub fn read_srt(path: &Path) -> ReelResult<Vec<SubtitleEntry>> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("read srt '{}'", path.display()))?;
    parse_srt(&text)
}

/// Parse SRT text into validated entries, in file order.
pub fn parse_srt(text: &str) -> ReelResult<Vec<SubtitleEntry>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut out = Vec::new();
    let mut block = Vec::<&str>::new();
    let mut position = 0usize;

    for line in text.lines().chain(std::iter::once("")) {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            if !block.is_empty() {
                position += 1;
                out.push(parse_block(position, &block)?);
                block.clear();
            }
            continue;
        }
        block.push(line);
    }

    Ok(out)
}

fn parse_block(position: usize, lines: &[&str]) -> ReelResult<SubtitleEntry> {
    // The numeric counter line is optional; some generators omit it.
    let mut idx = 0;
    if !lines[0].contains("-->") {
        idx = 1;
    }
    let timing = lines
        .get(idx)
        .ok_or_else(|| ReelError::input(position, "missing timing line"))?;
    let (start, end) = timing
        .split_once("-->")
        .ok_or_else(|| ReelError::input(position, format!("malformed timing line '{timing}'")))?;
    let start_ms = parse_timestamp(start)
        .ok_or_else(|| ReelError::input(position, format!("malformed start time '{}'", start.trim())))?;
    // Trailing coordinates (`X1:.. X2:..`) may follow the end time.
    let end = end.split_whitespace().next().unwrap_or("");
    let end_ms = parse_timestamp(end)
        .ok_or_else(|| ReelError::input(position, format!("malformed end time '{end}'")))?;

    let body = lines[idx + 1..]
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if body.is_empty() {
        return Err(ReelError::input(position, "subtitle block has no text"));
    }

    SubtitleEntry::from_raw(position, start_ms, end_ms, &body)
}

/// Parse `HH:MM:SS,mmm` (or `.mmm`) into milliseconds.
pub fn parse_timestamp(s: &str) -> Option<u64> {
    let s = s.trim();
    let (hms, millis) = s.split_once([',', '.']).unwrap_or((s, "0"));
    let mut parts = hms.split(':');
    let h: u64 = parts.next()?.trim().parse().ok()?;
    let m: u64 = parts.next()?.trim().parse().ok()?;
    let sec: u64 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() || m >= 60 || sec >= 60 {
        return None;
    }
    let millis = millis.trim();
    if millis.is_empty() || millis.len() > 3 || !millis.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // "5" after the separator means 500 ms, as in "00:00:01,5".
    let ms: u64 = format!("{millis:0<3}").parse().ok()?;
    h.checked_mul(60)?
        .checked_add(m)?
        .checked_mul(60)?
        .checked_add(sec)?
        .checked_mul(1000)?
        .checked_add(ms)
}

#[cfg(test)]
#[path = "../../tests/unit/subtitle/srt.rs"]
mod tests;
