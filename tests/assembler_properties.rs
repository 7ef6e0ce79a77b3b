use execmon::output::LineAssembler;
use proptest::prelude::*;

/// Split `bytes` at the given (unsorted, possibly out of range) offsets.
fn chunked(bytes: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (bytes.len() + 1)).collect();
    points.sort_unstable();
    points.dedup();

    let mut chunks = Vec::new();
    let mut start = 0;
    for point in points {
        chunks.push(bytes[start..point].to_vec());
        start = point;
    }
    chunks.push(bytes[start..].to_vec());
    chunks
}

fn assemble(chunks: &[Vec<u8>]) -> Vec<String> {
    let mut assembler = LineAssembler::new(false);
    let mut lines = Vec::new();
    for chunk in chunks {
        lines.extend(assembler.push(chunk));
    }
    lines.extend(assembler.finish());
    lines
}

proptest! {
    #[test]
    fn concatenated_lines_reproduce_the_input(
        text in "[a-zé€ \r\n]{0,80}",
        cuts in proptest::collection::vec(0usize..200, 0..8),
    ) {
        let lines = assemble(&chunked(text.as_bytes(), &cuts));
        prop_assert_eq!(lines.concat(), text);
    }

    #[test]
    fn chunking_does_not_change_the_lines(
        text in "[a-zé€ \r\n]{0,80}",
        cuts in proptest::collection::vec(0usize..200, 0..8),
    ) {
        let whole = assemble(&[text.as_bytes().to_vec()]);
        let split = assemble(&chunked(text.as_bytes(), &cuts));
        prop_assert_eq!(split, whole);
    }

    #[test]
    fn only_the_last_line_may_be_unterminated(
        text in "[a-z \r\n]{0,80}",
        cuts in proptest::collection::vec(0usize..200, 0..8),
    ) {
        let lines = assemble(&chunked(text.as_bytes(), &cuts));
        if let Some((_, init)) = lines.split_last() {
            for line in init {
                prop_assert!(line.ends_with('\n') || line.ends_with('\r'), "unterminated line {:?}", line);
                prop_assert!(!line.is_empty());
            }
        }
    }
}
