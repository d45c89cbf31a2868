//! Subtitle timeline to frame tasks, and frame tasks to bounded batches.

pub mod batch;
pub mod planner;
