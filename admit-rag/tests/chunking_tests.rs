//! Property tests for chunk counts, overlap and coverage.

use admit_rag::{Chunk, Chunker, Document, FixedSizeChunker, SentenceChunker};
use proptest::prelude::*;

/// Text over a small alphabet that includes multi-byte chars and sentence
/// punctuation.
fn arb_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            8 => proptest::char::range('a', 'z'),
            2 => Just(' '),
            1 => Just('.'),
            1 => Just('\n'),
            1 => Just('é'),
            1 => Just('₹'),
        ],
        0..400,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

/// `(chunk_size, chunk_overlap)` with `chunk_overlap < chunk_size`.
fn arb_params() -> impl Strategy<Value = (usize, usize)> {
    (1usize..60).prop_flat_map(|size| (Just(size), 0..size))
}

fn expected_count(len: usize, size: usize, overlap: usize) -> usize {
    if len == 0 {
        0
    } else if len <= size {
        1
    } else {
        1 + (len - size).div_ceil(size - overlap)
    }
}

fn assert_text_matches_offsets(text: &str, chunks: &[Chunk]) -> Result<(), TestCaseError> {
    for chunk in chunks {
        let expected: String =
            text.chars().skip(chunk.start_offset).take(chunk.end_offset - chunk.start_offset).collect();
        prop_assert_eq!(&chunk.text, &expected);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn fixed_chunk_count_follows_window_formula(text in arb_text(), (size, overlap) in arb_params()) {
        let len = text.chars().count();
        let chunks = FixedSizeChunker::new(size, overlap).chunk(&Document::new("d", text));
        prop_assert_eq!(chunks.len(), expected_count(len, size, overlap));
    }

    #[test]
    fn fixed_windows_overlap_exactly(text in arb_text(), (size, overlap) in arb_params()) {
        let len = text.chars().count();
        let chunks = FixedSizeChunker::new(size, overlap).chunk(&Document::new("d", text.clone()));
        assert_text_matches_offsets(&text, &chunks)?;

        if let (Some(first), Some(last)) = (chunks.first(), chunks.last()) {
            prop_assert_eq!(first.start_offset, 0);
            prop_assert_eq!(last.end_offset, len);
        }

        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.sequence_index, i);
            prop_assert!(chunk.len() <= size);
            prop_assert!(!chunk.is_empty());
        }

        for pair in chunks.windows(2) {
            prop_assert_eq!(pair[0].len(), size);
            prop_assert_eq!(pair[1].start_offset, pair[0].start_offset + size - overlap);
            // The shared chars are identical in both chunks.
            let shared = pair[0].end_offset.saturating_sub(pair[1].start_offset);
            let tail: String = pair[0].text.chars().skip(pair[0].len() - shared).collect();
            let head: String = pair[1].text.chars().take(shared).collect();
            prop_assert_eq!(tail, head);
        }
    }

    #[test]
    fn sentence_chunks_are_bounded_and_cover_text(text in arb_text(), (size, overlap) in arb_params()) {
        let len = text.chars().count();
        let chunks = SentenceChunker::new(size, overlap).chunk(&Document::new("d", text.clone()));
        assert_text_matches_offsets(&text, &chunks)?;

        prop_assert_eq!(chunks.is_empty(), len == 0);
        if let (Some(first), Some(last)) = (chunks.first(), chunks.last()) {
            prop_assert_eq!(first.start_offset, 0);
            prop_assert_eq!(last.end_offset, len);
        }
        for chunk in &chunks {
            prop_assert!(chunk.len() <= size);
        }
        for pair in chunks.windows(2) {
            prop_assert!(pair[1].start_offset <= pair[0].end_offset, "gap between chunks");
            prop_assert!(pair[1].end_offset > pair[0].end_offset);
        }
    }
}
