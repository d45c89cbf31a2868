#![forbid(unsafe_code)]

pub mod encode;
pub mod foundation;
pub mod layout;
pub mod render;
pub mod session;
pub mod store;
pub mod subtitle;
pub mod timeline;

pub use encode::assembler::{Assembler, ExportReport, ExportStage};
pub use encode::{EncodeJob, VideoEncoder, reconcile_durations};
pub use foundation::config::{
    EncoderChoice, EncoderOpts, FailurePolicy, PipelineConfig, WorkerPolicy,
};
pub use foundation::core::{Canvas, Fps, FrameIndex, FrameRange};
pub use foundation::error::{ReelError, ReelResult};
pub use layout::podcast::{PodcastLayout, PodcastLayoutFactory, PodcastLayoutSpec};
pub use layout::{Layout, LayoutFactory, LayoutSlots};
pub use render::frame::FrameRGBA;
pub use session::generator::{GeneratedVideo, MediaInputs, VideoGenerator};
pub use subtitle::entry::SubtitleEntry;
pub use timeline::planner::{FrameTask, TimelinePlan, plan_timeline};
