use super::*;

const PODCAST_SRT: &str = "1
00:00:00,000 --> 00:00:04,500
[Host] Welcome to our podcast!

2
00:00:04,600 --> 00:00:08,200
[Guest] Thank you! Glad to be here.
";

#[test]
fn parses_speaker_tagged_blocks_in_order() {
    let subs = parse_srt(PODCAST_SRT).unwrap();
    assert_eq!(subs.len(), 2);
    assert_eq!(subs[0].speaker(), "Host");
    assert_eq!(subs[0].start_ms(), 0);
    assert_eq!(subs[0].end_ms(), 4_500);
    assert_eq!(subs[1].speaker(), "Guest");
    assert_eq!(subs[1].text(), "Thank you! Glad to be here.");
    assert_eq!(subs[1].start_ms(), 4_600);
    assert_eq!(subs[1].end_ms(), 8_200);
}

#[test]
fn tolerates_crlf_bom_and_multiline_text() {
    let text = "\u{feff}1\r\n00:00:01,000 --> 00:00:02,000\r\n[Host] first\r\nsecond line\r\n\r\n";
    let subs = parse_srt(text).unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].text(), "first second line");
}

#[test]
fn block_without_speaker_reports_its_position() {
    let text = "1\n00:00:00,000 --> 00:00:01,000\n[Host] ok\n\n2\n00:00:01,000 --> 00:00:02,000\nno speaker\n";
    match parse_srt(text).unwrap_err() {
        ReelError::Input { position, .. } => assert_eq!(position, 2),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn malformed_timing_is_rejected() {
    let text = "1\n00:00:00,000 -> 00:00:01,000\n[Host] hi\n";
    assert!(parse_srt(text).is_err());
}

#[test]
fn timestamps_parse_with_comma_or_dot() {
    assert_eq!(parse_timestamp("00:00:04,500"), Some(4_500));
    assert_eq!(parse_timestamp("01:01:01.5"), Some(3_661_500));
    assert_eq!(parse_timestamp("00:61:00,000"), None);
    assert_eq!(parse_timestamp("garbage"), None);
}

#[test]
fn oversized_hours_are_an_input_error() {
    assert_eq!(parse_timestamp("99999999999999999:00:00,000"), None);
    assert_eq!(parse_timestamp("5124095576031:00:00,000"), None);

    let text = "1\n00:00:00,000 --> 00:00:01,000\n[Host] ok\n\n\
                2\n99999999999999999:00:00,000 --> 99999999999999999:00:01,000\n[Host] hi\n";
    match parse_srt(text).unwrap_err() {
        ReelError::Input { position, .. } => assert_eq!(position, 2),
        other => panic!("unexpected error: {other}"),
    }
}
