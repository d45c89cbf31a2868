use super::*;

fn frames(n: usize) -> Vec<PathBuf> {
    (0..n)
        .map(|i| PathBuf::from(format!("/run/batch_0/frame_{i:08}.png")))
        .collect()
}

#[test]
fn renders_file_duration_pairs_in_order() {
    let m = ConcatManifest::new(&frames(2), Fps::integer(30).unwrap(), false).unwrap();
    assert_eq!(
        m.render(),
        "ffconcat version 1.0\n\
         file '/run/batch_0/frame_00000000.png'\n\
         duration 0.033333\n\
         file '/run/batch_0/frame_00000001.png'\n\
         duration 0.033333\n\
         file '/run/batch_0/frame_00000001.png'\n"
    );
}

#[test]
fn shortened_last_frame_lasts_half_a_frame() {
    let m = ConcatManifest::new(&frames(3), Fps::integer(25).unwrap(), true).unwrap();
    let d = m.entries().iter().map(|e| e.duration_secs).collect::<Vec<_>>();
    assert_eq!(d, vec![0.04, 0.04, 0.02]);
    assert!((m.total_duration_secs() - 0.1).abs() < 1e-12);
}

#[test]
fn rendering_is_deterministic() {
    let fps = Fps::integer(30).unwrap();
    let a = ConcatManifest::new(&frames(243), fps, false).unwrap();
    let b = ConcatManifest::new(&frames(243), fps, false).unwrap();
    assert_eq!(a.render(), b.render());
    assert!((a.total_duration_secs() - 8.1).abs() < 1e-9);
}

#[test]
fn single_quotes_are_escaped() {
    assert_eq!(
        escape_concat_path(Path::new("/tmp/it's/frame.png")),
        r"/tmp/it'\''s/frame.png"
    );
}

#[test]
fn empty_frame_list_is_rejected() {
    assert!(ConcatManifest::new(&[], Fps::integer(30).unwrap(), false).is_err());
}

#[test]
fn write_to_dir_round_trips_bytes() {
    let tmp = tempfile::tempdir().unwrap();
    let m = ConcatManifest::new(&frames(4), Fps::integer(30).unwrap(), false).unwrap();
    let path = m.write_to_dir(tmp.path()).unwrap();
    assert!(path.ends_with(MANIFEST_FILE_NAME));
    assert_eq!(std::fs::read_to_string(path).unwrap(), m.render());
}
