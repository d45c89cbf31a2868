use super::*;
use crate::foundation::core::{Canvas, Fps};
use crate::layout::{LayoutFactory, LayoutSetup, LayoutSlots};
use crate::render::frame::FrameRGBA;
use crate::subtitle::entry::SubtitleEntry;
use crate::timeline::batch::Batcher;
use crate::timeline::planner::plan_timeline;
use std::path::Path;
use std::sync::atomic::AtomicUsize;

/// Solid frame whose red channel encodes opacity; fails on text "boom", panics on "panic".
struct StubLayout;

impl Layout for StubLayout {
    fn slots(&self) -> LayoutSlots {
        LayoutSlots::default()
    }

    fn canvas(&self) -> Canvas {
        Canvas {
            width: 2,
            height: 2,
        }
    }

    fn add_speaker(&mut self, _: &str, _: &Path) -> ReelResult<()> {
        Ok(())
    }

    fn create_frame(
        &mut self,
        subtitle: Option<&SubtitleEntry>,
        opacity: u8,
    ) -> ReelResult<FrameRGBA> {
        match subtitle.map(SubtitleEntry::text) {
            Some("boom") => Err(ReelError::layout("boom")),
            Some("panic") => panic!("stub layout panic"),
            _ => Ok(FrameRGBA::solid(2, 2, [opacity, 0, 0, 255])),
        }
    }
}

#[derive(Default)]
struct StubFactory {
    builds: AtomicUsize,
    broken: bool,
}

impl LayoutFactory for StubFactory {
    fn build(&self) -> ReelResult<Box<dyn Layout>> {
        self.builds.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        if self.broken {
            return Err(ReelError::layout("no fonts"));
        }
        Ok(Box::new(StubLayout))
    }
}

/// At 10 fps every 100 ms is one frame.
fn batches(lines: &[(&str, u64)], batch_size: usize) -> Vec<Batch> {
    let mut t = 0;
    let subs = lines
        .iter()
        .enumerate()
        .map(|(i, (text, frames))| {
            let e = SubtitleEntry::new(i + 1, t, t + frames * 100, "Host", *text).unwrap();
            t += frames * 100;
            e
        })
        .collect::<Vec<_>>();
    let plan = plan_timeline(&subs, Fps::integer(10).unwrap()).unwrap();
    Batcher::new(batch_size).unwrap().partition(plan.tasks)
}

#[test]
fn renders_every_frame_and_reports_progress() {
    let tmp = tempfile::tempdir().unwrap();
    let mut store = FrameStore::new(tmp.path());
    let factory = StubFactory::default();
    let setup = LayoutSetup::default();
    let configured = ConfiguredFactory::new(&factory, &setup);
    let batches = batches(&[("hello", 20), ("again", 5)], 10);
    assert_eq!(batches.len(), 3);

    let scheduler = RenderScheduler::new(3, 1, FailurePolicy::BestEffort).unwrap();
    let mut progress = Vec::new();
    let report = scheduler
        .run(&batches, &mut store, &configured, &mut |p| progress.push(*p))
        .unwrap();

    assert_eq!(report.frames_total, 25);
    assert_eq!(report.frames_rendered, 25);
    assert!(report.is_complete());
    assert_eq!(report.batches, 3);

    assert_eq!(progress.len(), 25);
    assert_eq!(progress.last().unwrap().frames_done, 25);
    // Batches are drained one at a time.
    let order = progress.iter().map(|p| p.batch).collect::<Vec<_>>();
    let mut sorted = order.clone();
    sorted.sort();
    assert_eq!(order, sorted);
    for b in 0..3 {
        let last = progress.iter().filter(|p| p.batch == b).last().unwrap();
        assert_eq!(last.completed, last.batch_total);
    }

    let paths = store.finalize().unwrap();
    assert_eq!(paths.len(), 25);
    assert!(paths[0].ends_with("batch_0/frame_00000000.png"));
    assert!(paths[24].ends_with("batch_2/frame_00000024.png"));
    assert!(store.missing_frames(25).is_empty());

    // First fade frame is fully transparent red-on-black: opacity 0.
    let first = image::open(&paths[0]).unwrap().to_rgba8();
    assert_eq!(first.get_pixel(0, 0).0, [0, 0, 0, 255]);
    let main = image::open(&paths[19]).unwrap().to_rgba8();
    assert_eq!(main.get_pixel(0, 0).0, [255, 0, 0, 255]);

    // Layouts are built per worker slice, not per frame.
    assert!(factory.builds.load(std::sync::atomic::Ordering::Relaxed) <= 3 * 3);
}

#[test]
fn best_effort_leaves_gaps_for_failed_frames() {
    let tmp = tempfile::tempdir().unwrap();
    let mut store = FrameStore::new(tmp.path());
    let factory = StubFactory::default();
    let setup = LayoutSetup::default();
    let configured = ConfiguredFactory::new(&factory, &setup);
    let batches = batches(&[("fine", 4), ("boom", 3), ("panic", 2), ("fine", 1)], 4);

    let scheduler = RenderScheduler::new(2, 1, FailurePolicy::BestEffort).unwrap();
    let report = scheduler
        .run(&batches, &mut store, &configured, &mut |_| {})
        .unwrap();

    assert_eq!(report.frames_total, 10);
    assert_eq!(report.frames_rendered, 5);
    assert_eq!(report.failures.len(), 5);
    assert!(
        report
            .failures
            .iter()
            .all(|f| matches!(f.error, ReelError::Render { .. }))
    );

    let missing = store.missing_frames(10);
    assert_eq!(
        missing.iter().map(|f| f.0).collect::<Vec<_>>(),
        vec![4, 5, 6, 7, 8]
    );
    assert_eq!(store.finalize().unwrap().len(), 5);
}

#[test]
fn fail_batch_returns_the_first_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let mut store = FrameStore::new(tmp.path());
    let factory = StubFactory::default();
    let setup = LayoutSetup::default();
    let configured = ConfiguredFactory::new(&factory, &setup);
    let batches = batches(&[("fine", 3), ("boom", 3), ("fine", 6)], 3);

    let scheduler = RenderScheduler::new(2, 1, FailurePolicy::FailBatch).unwrap();
    let err = scheduler
        .run(&batches, &mut store, &configured, &mut |_| {})
        .unwrap_err();
    match err {
        ReelError::Render { frame, .. } => assert!((3..6).contains(&frame.0)),
        other => panic!("unexpected error: {other}"),
    }
    // The batches after the failing one never started.
    assert!(!tmp.path().join("batch_2").exists());
}

#[test]
fn waves_of_batches_render_the_same_frames() {
    let tmp = tempfile::tempdir().unwrap();
    let mut store = FrameStore::new(tmp.path());
    let factory = StubFactory::default();
    let setup = LayoutSetup::default();
    let configured = ConfiguredFactory::new(&factory, &setup);
    let batches = batches(&[("hello", 17)], 4);

    let scheduler = RenderScheduler::new(4, 3, FailurePolicy::BestEffort).unwrap();
    let report = scheduler
        .run(&batches, &mut store, &configured, &mut |_| {})
        .unwrap();
    assert!(report.is_complete());

    let idx = store
        .finalize()
        .unwrap()
        .iter()
        .map(|p| crate::store::frame_store::parse_frame_index(p).unwrap().0)
        .collect::<Vec<_>>();
    assert_eq!(idx, (0..17).collect::<Vec<_>>());
}

#[test]
fn unbuildable_layout_fails_every_frame() {
    let tmp = tempfile::tempdir().unwrap();
    let mut store = FrameStore::new(tmp.path());
    let factory = StubFactory {
        broken: true,
        ..Default::default()
    };
    let setup = LayoutSetup::default();
    let configured = ConfiguredFactory::new(&factory, &setup);
    let batches = batches(&[("hello", 6)], 3);

    let scheduler = RenderScheduler::new(2, 1, FailurePolicy::BestEffort).unwrap();
    let report = scheduler
        .run(&batches, &mut store, &configured, &mut |_| {})
        .unwrap();
    assert_eq!(report.frames_rendered, 0);
    assert_eq!(report.failures.len(), 6);
    assert!(report.failures[0].error.to_string().contains("no fonts"));
}

#[test]
fn zero_workers_or_waves_are_rejected() {
    assert!(RenderScheduler::new(0, 1, FailurePolicy::BestEffort).is_err());
    assert!(RenderScheduler::new(1, 0, FailurePolicy::BestEffort).is_err());
}

#[test]
fn stride_reporting_covers_batch_ends_and_the_last_frame() {
    let tmp = tempfile::tempdir().unwrap();
    let mut store = FrameStore::new(tmp.path());
    let factory = StubFactory::default();
    let setup = LayoutSetup::default();
    let configured = ConfiguredFactory::new(&factory, &setup);
    let batches = batches(&[("hello", 20), ("again", 5)], 10);

    let scheduler = RenderScheduler::new(2, 1, FailurePolicy::BestEffort).unwrap();
    let mut reported = Vec::new();
    scheduler
        .run(&batches, &mut store, &configured, &mut |p| {
            if p.is_report_point(7) {
                reported.push(*p);
            }
        })
        .unwrap();

    let done = reported.iter().map(|p| p.frames_done).collect::<Vec<_>>();
    assert!(done.contains(&7) && done.contains(&14) && done.contains(&21));
    // Batch ends at 10, 20 and 25.
    assert!(done.contains(&10) && done.contains(&20));
    assert_eq!(reported.last().unwrap().frames_done, 25);
    assert_eq!(reported.last().unwrap().percent(), 100.0);
    assert!(reported.iter().filter(|p| p.finishes_batch()).count() == 3);
    assert!(reported.len() < 25);
}

#[test]
fn progress_percent_handles_an_empty_run() {
    let p = RenderProgress {
        batch: 0,
        completed: 0,
        batch_total: 0,
        frames_done: 0,
        frames_total: 0,
    };
    assert_eq!(p.percent(), 100.0);
    assert!(p.is_report_point(0));
    let mid = RenderProgress {
        batch: 1,
        completed: 3,
        batch_total: 10,
        frames_done: 13,
        frames_total: 40,
    };
    assert!(!mid.is_report_point(0));
    assert!(!mid.is_report_point(5));
    assert!(mid.is_report_point(13));
    assert_eq!(mid.percent(), 32.5);
}
