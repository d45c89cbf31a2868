use super::*;
use crate::foundation::core::Fps;
use crate::subtitle::entry::SubtitleEntry;
use crate::timeline::planner::plan_timeline;

fn tasks(frames: u64) -> Vec<FrameTask> {
    // One subtitle of exactly `frames` frames at 10 fps.
    let fps = Fps::integer(10).unwrap();
    let sub = SubtitleEntry::new(1, 0, frames * 100, "Host", "hi").unwrap();
    let plan = plan_timeline(&[sub], fps).unwrap();
    assert_eq!(plan.total_frames, frames);
    plan.tasks
}

#[test]
fn seven_hundred_tasks_split_300_300_100() {
    let all = tasks(700);
    let batches = Batcher::new(300).unwrap().partition(all.clone());
    assert_eq!(
        batches.iter().map(Batch::len).collect::<Vec<_>>(),
        vec![300, 300, 100]
    );
    assert_eq!(
        batches.iter().map(|b| b.index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(batches[1].first_frame(), Some(FrameIndex(300)));
    assert_eq!(batches[2].last_frame(), Some(FrameIndex(699)));

    let rejoined = batches.into_iter().flat_map(|b| b.tasks).collect::<Vec<_>>();
    assert_eq!(rejoined, all);
}

#[test]
fn exact_multiple_has_no_trailing_empty_batch() {
    let batches = Batcher::new(50).unwrap().partition(tasks(100));
    assert_eq!(batches.len(), 2);
    assert!(batches.iter().all(|b| b.len() == 50));
}

#[test]
fn empty_input_yields_no_batches() {
    assert!(Batcher::new(10).unwrap().partition(Vec::new()).is_empty());
}

#[test]
fn zero_batch_size_is_rejected() {
    assert!(Batcher::new(0).is_err());
}
