use crate::foundation::core::FrameIndex;
use crate::foundation::error::{ReelError, ReelResult};
use crate::timeline::planner::FrameTask;

/// An ordered group of tasks rendered as one parallel unit.
#[derive(Clone, Debug)]
pub struct Batch {
    pub index: usize,
    pub tasks: Vec<FrameTask>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn first_frame(&self) -> Option<FrameIndex> {
        self.tasks.first().map(|t| t.frame_index)
    }

    pub fn last_frame(&self) -> Option<FrameIndex> {
        self.tasks.last().map(|t| t.frame_index)
    }
}

/// Splits a task sequence into batches of at most `batch_size`, keeping task order.
#[derive(Clone, Copy, Debug)]
pub struct Batcher {
    batch_size: usize,
}

impl Batcher {
    pub fn new(batch_size: usize) -> ReelResult<Self> {
        if batch_size == 0 {
            return Err(ReelError::validation("batch_size must be >= 1"));
        }
        Ok(Self { batch_size })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn partition(&self, tasks: Vec<FrameTask>) -> Vec<Batch> {
        let mut out = Vec::with_capacity(tasks.len().div_ceil(self.batch_size));
        let mut current = Vec::with_capacity(self.batch_size.min(tasks.len()));
        for task in tasks {
            current.push(task);
            if current.len() == self.batch_size {
                out.push(Batch {
                    index: out.len(),
                    tasks: std::mem::take(&mut current),
                });
            }
        }
        if !current.is_empty() {
            out.push(Batch {
                index: out.len(),
                tasks: current,
            });
        }
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/batch.rs"]
mod tests;
