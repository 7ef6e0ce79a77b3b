use execmon::output::{LineAssembler, split_lines};

fn feed(assembler: &mut LineAssembler, chunks: &[&[u8]]) -> Vec<String> {
    let mut lines = Vec::new();
    for chunk in chunks {
        lines.extend(assembler.push(chunk));
    }
    lines.extend(assembler.finish());
    lines
}

#[test]
fn split_lines_keeps_terminators_attached() {
    let (lines, rest) = split_lines("a\nb\r\nc\rd");
    assert_eq!(lines, vec!["a\n", "b\r\n", "c\r"]);
    assert_eq!(rest, "d");
}

#[test]
fn split_lines_holds_back_trailing_carriage_return() {
    let (lines, rest) = split_lines("done\nabc\r");
    assert_eq!(lines, vec!["done\n"]);
    assert_eq!(rest, "abc\r");
}

#[test]
fn whole_lines_in_one_chunk() {
    let mut assembler = LineAssembler::new(false);
    assert_eq!(assembler.push(b"a\nb\n"), vec!["a\n", "b\n"]);
    assert!(!assembler.has_pending());
    assert_eq!(assembler.finish(), None);
}

#[test]
fn line_split_across_chunks_is_emitted_once() {
    let mut assembler = LineAssembler::new(false);
    assert!(assembler.push(b"hel").is_empty());
    assert!(assembler.has_pending());
    assert_eq!(assembler.push(b"lo\nwor"), vec!["hello\n"]);
    assert!(assembler.push(b"ld").is_empty());
    assert_eq!(assembler.finish(), Some("world".to_string()));
}

#[test]
fn crlf_split_between_chunks_stays_one_line() {
    let mut assembler = LineAssembler::new(false);
    assert!(assembler.push(b"a\r").is_empty());
    assert_eq!(assembler.push(b"\nb"), vec!["a\r\n"]);
    assert_eq!(assembler.finish(), Some("b".to_string()));
}

#[test]
fn lone_carriage_returns_end_lines() {
    let mut assembler = LineAssembler::new(false);
    let lines = feed(&mut assembler, &[b"10%\r20%\r", b"30%\rdone\n"]);
    assert_eq!(lines, vec!["10%\r", "20%\r", "30%\r", "done\n"]);
}

#[test]
fn multibyte_character_split_across_chunks() {
    let mut assembler = LineAssembler::new(false);
    assert!(assembler.push(b"caf\xC3").is_empty());
    assert_eq!(assembler.push(b"\xA9\n"), vec!["café\n"]);
}

#[test]
fn invalid_bytes_become_replacement_characters() {
    let mut assembler = LineAssembler::new(false);
    assert_eq!(assembler.push(b"a\xFFb\n"), vec!["a\u{FFFD}b\n"]);
}

#[test]
fn truncated_sequence_at_end_of_stream_is_replaced() {
    let mut assembler = LineAssembler::new(false);
    assert!(assembler.push(b"x\xE2\x82").is_empty());
    assert_eq!(assembler.finish(), Some("x\u{FFFD}".to_string()));
}

#[test]
fn end_in_newlines_terminates_every_line() {
    let mut assembler = LineAssembler::new(true);
    let lines = feed(&mut assembler, &[b"a\nb"]);
    assert_eq!(lines, vec!["a\n", "b\n"]);
}

#[test]
fn empty_stream_yields_nothing() {
    let mut assembler = LineAssembler::new(true);
    assert!(assembler.push(b"").is_empty());
    assert_eq!(assembler.finish(), None);
}
