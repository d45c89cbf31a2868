use super::*;

#[test]
fn fps_validation_rejects_zero() {
    assert!(Fps::new(0, 1).is_err());
    assert!(Fps::new(30, 0).is_err());
    assert_eq!(Fps::integer(25).unwrap(), Fps { num: 25, den: 1 });
}

#[test]
fn frame_at_ms_matches_real_division_floor() {
    let fps = Fps::integer(30).unwrap();
    assert_eq!(fps.frame_at_ms(0), 0);
    assert_eq!(fps.frame_at_ms(33), 0);
    assert_eq!(fps.frame_at_ms(34), 1);
    assert_eq!(fps.frame_at_ms(4_500), 135);
    assert_eq!(fps.frame_at_ms(4_600), 138);
    assert_eq!(fps.frame_at_ms(8_200), 246);
}

#[test]
fn frame_at_ms_supports_rational_rates() {
    let ntsc = Fps::new(30_000, 1001).unwrap();
    // 1001 ms at 29.97 fps is exactly 30 frames.
    assert_eq!(ntsc.frame_at_ms(1001), 30);
    assert_eq!(ntsc.frame_at_ms(1000), 29);
}

#[test]
fn frames_to_secs_uses_frame_duration() {
    let fps = Fps::integer(30).unwrap();
    assert!((fps.frames_to_secs(243) - 8.1).abs() < 1e-9);
    assert!((fps.frame_duration_secs() - 1.0 / 30.0).abs() < 1e-12);
}

#[test]
fn frame_range_len_and_contains() {
    let r = FrameRange::new(FrameIndex(3), FrameIndex(7)).unwrap();
    assert_eq!(r.len_frames(), 4);
    assert!(r.contains(FrameIndex(3)));
    assert!(!r.contains(FrameIndex(7)));
    assert!(FrameRange::new(FrameIndex(2), FrameIndex(1)).is_err());
}

#[test]
fn canvas_requires_even_dimensions() {
    assert!(Canvas::default().validate().is_ok());
    assert!(
        Canvas {
            width: 11,
            height: 10
        }
        .validate()
        .is_err()
    );
    assert!(
        Canvas {
            width: 0,
            height: 10
        }
        .validate()
        .is_err()
    );
}
