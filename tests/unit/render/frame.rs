use super::*;

#[test]
fn flatten_premul_alpha_0_returns_bg() {
    let src = vec![0u8, 0, 0, 0];
    let mut dst = vec![0u8; 4];
    flatten_premul_over_bg_to_opaque_rgba8(&mut dst, &src, [10, 20, 30, 255]).unwrap();
    assert_eq!(dst, vec![10, 20, 30, 255]);
}

#[test]
fn flatten_premul_alpha_255_is_identity() {
    let src = vec![1u8, 2, 3, 255];
    let mut dst = vec![0u8; 4];
    flatten_premul_over_bg_to_opaque_rgba8(&mut dst, &src, [10, 20, 30, 255]).unwrap();
    assert_eq!(dst, src);
}

#[test]
fn flatten_straight_half_alpha_blends() {
    let src = vec![255u8, 0, 0, 128];
    let mut dst = vec![0u8; 4];
    flatten_straight_over_bg_to_opaque_rgba8(&mut dst, &src, [0, 0, 255, 255]).unwrap();
    assert_eq!(dst, vec![128, 0, 127, 255]);
}

#[test]
fn mismatched_buffers_are_rejected() {
    let mut dst = vec![0u8; 8];
    assert!(flatten_premul_over_bg_to_opaque_rgba8(&mut dst, &[0u8; 4], [0, 0, 0, 255]).is_err());
}

#[test]
fn solid_frame_validates_and_stays_opaque() {
    let f = FrameRGBA::solid(4, 2, [20, 20, 20, 255]);
    f.validate().unwrap();
    let out = f.to_opaque_rgba8([0, 0, 0, 255]).unwrap();
    assert_eq!(out, f.data);

    let bad = FrameRGBA {
        width: 4,
        height: 2,
        data: vec![0; 3],
        premultiplied: false,
    };
    assert!(bad.validate().is_err());
}
