//! Frame buffers and the parallel batch render scheduler.

/// RGBA frame buffer and alpha flattening.
pub mod frame;
/// Batch-at-a-time parallel rendering into the frame store.
pub mod scheduler;
