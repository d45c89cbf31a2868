use super::*;

fn entry(start_ms: u64, end_ms: u64) -> SubtitleEntry {
    SubtitleEntry::new(1, start_ms, end_ms, "Host", "hello").unwrap()
}

#[test]
fn twenty_frame_span_fades_then_holds() {
    let fps = Fps::integer(30).unwrap();
    // 0..666 ms covers frames [0, 19]; 667 ms lands on frame 20.
    let plan = plan_timeline(&[entry(0, 667)], fps).unwrap();
    assert_eq!(plan.total_frames, 20);

    let opacities = plan.tasks.iter().map(|t| t.opacity).collect::<Vec<_>>();
    let mut expected = (0..15u64).map(|i| (i * 255 / 15) as u8).collect::<Vec<_>>();
    expected.extend([255; 5]);
    assert_eq!(opacities, expected);
    assert_eq!(&opacities[..3], &[0, 17, 34]);
    assert_eq!(opacities[14], 238);

    assert!(plan.tasks[..15].iter().all(|t| t.kind == TaskKind::Fade));
    assert!(plan.tasks[15..].iter().all(|t| t.kind == TaskKind::Main));
}

#[test]
fn sub_frame_subtitle_yields_no_tasks() {
    let fps = Fps::integer(30).unwrap();
    let plan = plan_timeline(&[entry(0, 20)], fps).unwrap();
    assert!(plan.is_empty());
    assert_eq!(plan.per_subtitle_frames, vec![0]);
}

#[test]
fn span_at_fade_threshold_is_all_fade() {
    let fps = Fps::integer(30).unwrap();
    // 500 ms at 30 fps is exactly 15 frames.
    let plan = plan_timeline(&[entry(0, 500)], fps).unwrap();
    assert_eq!(plan.total_frames, 15);
    assert!(plan.tasks.iter().all(|t| t.kind == TaskKind::Fade));
}

#[test]
fn short_span_fades_over_its_own_length() {
    let fps = Fps::integer(30).unwrap();
    let plan = plan_timeline(&[entry(0, 100)], fps).unwrap();
    let opacities = plan.tasks.iter().map(|t| t.opacity).collect::<Vec<_>>();
    assert_eq!(opacities, vec![0, 85, 170]);
}

#[test]
fn two_entry_podcast_plans_243_contiguous_frames() {
    let fps = Fps::integer(30).unwrap();
    let subs = vec![
        SubtitleEntry::new(1, 0, 4_500, "Host", "Welcome to our podcast!").unwrap(),
        SubtitleEntry::new(2, 4_600, 8_200, "Guest", "Thank you! Glad to be here.").unwrap(),
    ];
    let plan = plan_timeline(&subs, fps).unwrap();
    assert_eq!(plan.per_subtitle_frames, vec![135, 108]);
    assert_eq!(plan.total_frames, 243);
    assert!((plan.video_duration_secs(fps) - 8.1).abs() < 1e-9);

    for (i, t) in plan.tasks.iter().enumerate() {
        assert_eq!(t.frame_index, FrameIndex(i as u64));
    }
    // Second subtitle starts on timeline frame 138 but follows directly in run order.
    assert_eq!(plan.tasks[135].timeline_frame, 138);
    assert_eq!(plan.tasks[135].subtitle.position, 2);
    assert_eq!(plan.tasks[135].subtitle.entry.speaker(), "Guest");
}

#[test]
fn overlapping_subtitles_each_contribute_frames() {
    let fps = Fps::integer(30).unwrap();
    let plan = plan_timeline(&[entry(0, 1_000), entry(500, 1_000)], fps).unwrap();
    assert_eq!(plan.per_subtitle_frames, vec![30, 15]);
    assert_eq!(plan.total_frames, 45);
}

#[test]
fn decreasing_start_times_are_an_input_error() {
    let fps = Fps::integer(30).unwrap();
    let err = plan_timeline(&[entry(1_000, 2_000), entry(500, 3_000)], fps).unwrap_err();
    match err {
        ReelError::Input { position, .. } => assert_eq!(position, 2),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn fade_opacity_is_opaque_outside_the_fade() {
    assert_eq!(fade_opacity(0, 0), 255);
    assert_eq!(fade_opacity(15, 15), 255);
    assert_eq!(fade_opacity(7, 15), 119);
}
