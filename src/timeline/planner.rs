use std::sync::Arc;

use crate::foundation::core::{FrameIndex, FrameRange, Fps};
use crate::foundation::error::{ReelError, ReelResult};
use crate::subtitle::entry::SubtitleEntry;

/// Maximum number of fade-in frames at the head of a subtitle span.
pub const FADE_FRAMES: u64 = 15;

/// Fully opaque.
pub const OPAQUE: u8 = 255;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Fade,
    Main,
}

/// Shared handle to the subtitle a task belongs to.
///
/// `position` is the 1-based input position, kept for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubtitleRef {
    pub position: usize,
    pub entry: Arc<SubtitleEntry>,
}

/// One unit of render work. Immutable once planned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameTask {
    /// Run-wide contiguous index; the frame store and encoder order by this.
    pub frame_index: FrameIndex,
    /// Position of this frame on the subtitle timeline (`floor(start) + i`).
    pub timeline_frame: u64,
    pub kind: TaskKind,
    pub subtitle: SubtitleRef,
    pub opacity: u8,
}

#[derive(Clone, Debug, Default)]
pub struct TimelinePlan {
    pub tasks: Vec<FrameTask>,
    pub total_frames: u64,
    /// Frame count contributed by each subtitle, in input order.
    pub per_subtitle_frames: Vec<u64>,
}

impl TimelinePlan {
    pub fn video_duration_secs(&self, fps: Fps) -> f64 {
        fps.frames_to_secs(self.total_frames)
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Timeline span `[floor(start), floor(end))` a subtitle occupies at `fps`.
pub fn subtitle_span(entry: &SubtitleEntry, fps: Fps) -> FrameRange {
    let start = fps.frame_at_ms(entry.start_ms());
    let end = fps.frame_at_ms(entry.end_ms()).max(start);
    FrameRange {
        start: FrameIndex(start),
        end: FrameIndex(end),
    }
}

/// Opacity of fade frame `i` within a fade of `fade_len` frames.
pub fn fade_opacity(i: u64, fade_len: u64) -> u8 {
    if fade_len == 0 || i >= fade_len {
        return OPAQUE;
    }
    // i < fade_len, so the quotient is at most 254.
    ((i * u64::from(OPAQUE)) / fade_len) as u8
}

/// Expand subtitles into fade and main frame tasks.
///
/// Subtitles are processed in input order and each contributes its own span independently;
/// overlapping spans are not merged.
#[tracing::instrument(skip(subtitles), fields(subtitles = subtitles.len()))]
pub fn plan_timeline(subtitles: &[SubtitleEntry], fps: Fps) -> ReelResult<TimelinePlan> {
    let mut plan = TimelinePlan {
        tasks: Vec::new(),
        total_frames: 0,
        per_subtitle_frames: Vec::with_capacity(subtitles.len()),
    };
    let mut next_index = 0u64;
    let mut prev_start: Option<u64> = None;

    for (i, entry) in subtitles.iter().enumerate() {
        let position = i + 1;
        if let Some(prev) = prev_start
            && entry.start_ms() < prev
        {
            return Err(ReelError::input(
                position,
                format!(
                    "start time {} ms is earlier than the previous entry's start time {prev} ms",
                    entry.start_ms()
                ),
            ));
        }
        prev_start = Some(entry.start_ms());

        let span = subtitle_span(entry, fps);
        let span_len = span.len_frames();
        plan.per_subtitle_frames.push(span_len);
        if span_len == 0 {
            tracing::debug!(position, "subtitle spans less than one frame; skipped");
            continue;
        }

        let subtitle = SubtitleRef {
            position,
            entry: Arc::new(entry.clone()),
        };
        let fade_len = FADE_FRAMES.min(span_len);
        plan.tasks.reserve(span_len as usize);
        for k in 0..span_len {
            let (kind, opacity) = if k < fade_len {
                (TaskKind::Fade, fade_opacity(k, fade_len))
            } else {
                (TaskKind::Main, OPAQUE)
            };
            plan.tasks.push(FrameTask {
                frame_index: FrameIndex(next_index),
                timeline_frame: span.start.0 + k,
                kind,
                subtitle: subtitle.clone(),
                opacity,
            });
            next_index += 1;
        }
    }

    plan.total_frames = next_index;
    tracing::info!(
        frames = plan.total_frames,
        seconds = plan.video_duration_secs(fps),
        "timeline planned"
    );
    Ok(plan)
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/planner.rs"]
mod tests;
