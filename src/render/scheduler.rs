use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

use rayon::prelude::*;

use crate::foundation::config::{FailurePolicy, PipelineConfig};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{ReelError, ReelResult};
use crate::layout::{ConfiguredFactory, Layout};
use crate::store::frame_store::{BatchDir, FrameStore, FrameStoreEntry};
use crate::timeline::batch::Batch;
use crate::timeline::planner::SubtitleRef;

/// Payload handed to a render worker. Carries everything the worker needs; no shared state.
#[derive(Clone, Debug)]
pub struct RenderJob {
    pub frame_index: FrameIndex,
    pub subtitle: SubtitleRef,
    pub opacity: u8,
    pub batch_dir: BatchDir,
}

#[derive(Debug)]
pub struct FrameFailure {
    pub frame_index: FrameIndex,
    pub batch: usize,
    pub error: ReelError,
}

/// Worker to orchestrator message.
#[derive(Debug)]
enum FrameOutcome {
    Rendered { batch: usize, entry: FrameStoreEntry },
    Failed(FrameFailure),
}

impl FrameOutcome {
    fn batch(&self) -> usize {
        match self {
            FrameOutcome::Rendered { batch, .. } => *batch,
            FrameOutcome::Failed(f) => f.batch,
        }
    }
}

/// Reported after every frame completion, in arrival order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderProgress {
    pub batch: usize,
    /// Completions (rendered or failed) within `batch` so far.
    pub completed: usize,
    pub batch_total: usize,
    pub frames_done: u64,
    pub frames_total: u64,
}

impl RenderProgress {
    /// This completion was the last one of its batch.
    pub fn finishes_batch(&self) -> bool {
        self.completed == self.batch_total
    }

    /// Whether a reporter printing every `stride` frames (and at batch ends) should print now.
    pub fn is_report_point(&self, stride: u64) -> bool {
        self.finishes_batch()
            || self.frames_done == self.frames_total
            || (stride > 0 && self.frames_done % stride == 0)
    }

    /// Completed fraction of the whole run, in percent.
    pub fn percent(&self) -> f64 {
        if self.frames_total == 0 {
            return 100.0;
        }
        self.frames_done as f64 * 100.0 / self.frames_total as f64
    }
}

#[derive(Debug, Default)]
pub struct RenderReport {
    pub frames_total: u64,
    pub frames_rendered: u64,
    pub failures: Vec<FrameFailure>,
    pub batches: usize,
}

impl RenderReport {
    pub fn is_complete(&self) -> bool {
        self.frames_rendered == self.frames_total
    }
}

/// Renders batches of frame tasks on a dedicated rayon pool.
///
/// Batches are grouped into waves of `batches_in_flight`; a wave is fully drained before the
/// next one starts. Within a wave every task is submitted up front and completions are
/// recorded as they arrive.
pub struct RenderScheduler {
    pool: rayon::ThreadPool,
    workers: usize,
    batches_in_flight: usize,
    failure_policy: FailurePolicy,
}

impl RenderScheduler {
    pub fn new(
        workers: usize,
        batches_in_flight: usize,
        failure_policy: FailurePolicy,
    ) -> ReelResult<Self> {
        if batches_in_flight == 0 {
            return Err(ReelError::validation("batches_in_flight must be >= 1"));
        }
        Ok(Self {
            pool: build_thread_pool(workers)?,
            workers,
            batches_in_flight,
            failure_policy,
        })
    }

    pub fn from_config(cfg: &PipelineConfig) -> ReelResult<Self> {
        Self::new(
            cfg.workers.resolve_local(),
            cfg.batches_in_flight,
            cfg.failure_policy,
        )
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Render every batch, persisting into `store` and recording each completed frame.
    ///
    /// Under [`FailurePolicy::BestEffort`] failed frames are logged and left as gaps. Under
    /// [`FailurePolicy::FailBatch`] the first failure stops the wave and is returned.
    #[tracing::instrument(skip_all, fields(batches = batches.len(), workers = self.workers))]
    pub fn run(
        &self,
        batches: &[Batch],
        store: &mut FrameStore,
        factory: &ConfiguredFactory<'_>,
        on_progress: &mut dyn FnMut(&RenderProgress),
    ) -> ReelResult<RenderReport> {
        let frames_total = batches.iter().map(|b| b.len() as u64).sum();
        let mut report = RenderReport {
            frames_total,
            batches: batches.len(),
            ..Default::default()
        };
        let mut frames_done = 0u64;

        for wave in batches.chunks(self.batches_in_flight) {
            let mut jobs = Vec::with_capacity(wave.iter().map(Batch::len).sum());
            let mut batch_totals = HashMap::with_capacity(wave.len());
            for batch in wave {
                let dir = store.allocate_batch_directory(batch.index)?;
                batch_totals.insert(batch.index, batch.len());
                jobs.extend(batch.tasks.iter().map(|t| RenderJob {
                    frame_index: t.frame_index,
                    subtitle: t.subtitle.clone(),
                    opacity: t.opacity,
                    batch_dir: dir.clone(),
                }));
            }
            if jobs.is_empty() {
                continue;
            }

            let abort = AtomicBool::new(false);
            let mut completed = HashMap::<usize, usize>::with_capacity(wave.len());
            let mut first_error: Option<ReelError> = None;

            std::thread::scope(|scope| -> ReelResult<()> {
                let (tx, rx) = mpsc::sync_channel::<FrameOutcome>(self.workers.max(1) * 2);
                let jobs = &jobs;
                let abort = &abort;
                let policy = self.failure_policy;

                let producer = scope.spawn(move || {
                    render_wave(&self.pool, self.workers, jobs, factory, abort, &tx);
                    drop(tx);
                });

                for outcome in rx.iter() {
                    let batch = outcome.batch();
                    let done = completed.entry(batch).or_default();
                    *done += 1;
                    frames_done += 1;

                    match outcome {
                        FrameOutcome::Rendered { entry, .. } => {
                            tracing::debug!(frame = entry.frame_index.0, batch, "frame rendered");
                            report.frames_rendered += 1;
                            store.record(entry);
                        }
                        FrameOutcome::Failed(failure) => {
                            tracing::warn!(
                                frame = failure.frame_index.0,
                                batch,
                                error = %failure.error,
                                "frame failed"
                            );
                            if policy == FailurePolicy::FailBatch && first_error.is_none() {
                                abort.store(true, Ordering::Relaxed);
                                first_error = Some(ReelError::render(
                                    failure.frame_index,
                                    failure.error.to_string(),
                                ));
                            }
                            report.failures.push(failure);
                        }
                    }

                    let batch_total = batch_totals.get(&batch).copied().unwrap_or(0);
                    on_progress(&RenderProgress {
                        batch,
                        completed: *done,
                        batch_total,
                        frames_done,
                        frames_total,
                    });
                    if *done == batch_total {
                        tracing::info!(batch, frames = batch_total, "batch rendered");
                    }
                }

                producer
                    .join()
                    .map_err(|_| anyhow::anyhow!("render producer thread panicked"))?;
                Ok(())
            })?;

            if let Some(err) = first_error {
                return Err(err);
            }
        }

        if !report.failures.is_empty() {
            tracing::warn!(
                failed = report.failures.len(),
                rendered = report.frames_rendered,
                total = report.frames_total,
                "render finished with missing frames"
            );
        }
        Ok(report)
    }
}

fn render_wave(
    pool: &rayon::ThreadPool,
    workers: usize,
    jobs: &[RenderJob],
    factory: &ConfiguredFactory<'_>,
    abort: &AtomicBool,
    tx: &mpsc::SyncSender<FrameOutcome>,
) {
    // One contiguous slice per worker so each builds a single layout per wave.
    let min_len = jobs.len().div_ceil(workers.max(1)).max(1);
    pool.install(|| {
        jobs.par_iter().with_min_len(min_len).for_each_init(
            || factory.build(),
            |layout, job| {
                if abort.load(Ordering::Relaxed) {
                    return;
                }
                let outcome = match render_one(layout, job) {
                    Ok(path) => FrameOutcome::Rendered {
                        batch: job.batch_dir.batch_index(),
                        entry: FrameStoreEntry {
                            frame_index: job.frame_index,
                            path,
                        },
                    },
                    Err(error) => FrameOutcome::Failed(FrameFailure {
                        frame_index: job.frame_index,
                        batch: job.batch_dir.batch_index(),
                        error,
                    }),
                };
                // The receiver only hangs up when the orchestrator is unwinding.
                let _ = tx.send(outcome);
            },
        );
    });
}

fn render_one(
    layout: &mut ReelResult<Box<dyn Layout>>,
    job: &RenderJob,
) -> ReelResult<std::path::PathBuf> {
    let layout = match layout {
        Ok(layout) => layout,
        Err(e) => {
            return Err(ReelError::render(
                job.frame_index,
                format!("layout could not be built: {e}"),
            ));
        }
    };

    let frame = std::panic::catch_unwind(AssertUnwindSafe(|| {
        layout.create_frame(Some(&*job.subtitle.entry), job.opacity)
    }))
    .map_err(|_| ReelError::render(job.frame_index, "layout panicked while drawing"))?
    .map_err(|e| match e {
        e @ ReelError::Render { .. } => e,
        other => ReelError::render(job.frame_index, other.to_string()),
    })?;

    job.batch_dir.persist(job.frame_index, &frame)
}

fn build_thread_pool(threads: usize) -> ReelResult<rayon::ThreadPool> {
    if threads == 0 {
        return Err(ReelError::validation("render worker count must be >= 1"));
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("podreel-render-{i}"))
        .build()
        .map_err(|e| ReelError::validation(format!("failed to build render thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/render/scheduler.rs"]
mod tests;
