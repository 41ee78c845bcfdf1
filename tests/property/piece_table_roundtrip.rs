//! Property tests for piece-table reconstruction.
//!
//! # Invariants
//! - Building a table from a blob and emitting it reproduces the blob
//!   byte for byte.
//! - Applying a generated delta matches a naive line-based model of the
//!   same edit.

use proptest::prelude::*;

use cvscvt::intern::StringPool;
use cvscvt::piece_table::PieceTable;

/// Arbitrary small text, newline-heavy so piece boundaries get exercised.
fn blob() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(
        prop_oneof![
            4 => prop::char::range('a', 'z').prop_map(|c| c as u8),
            2 => Just(b'\n'),
        ],
        0..128,
    )
}

/// Splits text into newline-terminated lines the way the engine does: a
/// final fragment without `\n` still counts as a line.
fn lines_of(text: &[u8]) -> Vec<Vec<u8>> {
    let mut out: Vec<Vec<u8>> = Vec::new();
    let mut start = 0;
    for (i, &b) in text.iter().enumerate() {
        if b == b'\n' {
            out.push(text[start..=i].to_vec());
            start = i + 1;
        }
    }
    if start != text.len() {
        out.push(text[start..].to_vec());
    }
    out
}

proptest! {
    #[test]
    fn set_then_emit_is_identity(text in blob()) {
        let mut pool = StringPool::new();
        let sym = pool.intern(&text);
        let table = PieceTable::from_blob(&pool, sym);
        prop_assert_eq!(table.to_bytes(&pool), text);
    }

    #[test]
    fn line_count_matches_naive_split(text in blob()) {
        let mut pool = StringPool::new();
        let sym = pool.intern(&text);
        let table = PieceTable::from_blob(&pool, sym);
        prop_assert_eq!(table.line_count(), lines_of(&text).len());
    }

    #[test]
    fn delete_matches_line_model(
        text in blob(),
        at in 0usize..16,
        count in 1usize..8,
    ) {
        let mut pool = StringPool::new();
        let sym = pool.intern(&text);
        let table = PieceTable::from_blob(&pool, sym);

        let lines = lines_of(&text);
        prop_assume!(at < lines.len());
        let count = count.min(lines.len() - at);

        let delta = format!("d{} {}\n", at + 1, count);
        let dsym = pool.intern(delta.as_bytes());
        let got = table.modify(&pool, dsym).unwrap().to_bytes(&pool);

        let mut want = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            if i < at || i >= at + count {
                want.extend_from_slice(line);
            }
        }
        prop_assert_eq!(got, want);
    }

    #[test]
    fn insert_matches_line_model(
        text in blob(),
        at in 0usize..16,
        payload in prop::collection::vec(
            prop::collection::vec(prop::char::range('a', 'z').prop_map(|c| c as u8), 0..8),
            1..4,
        ),
    ) {
        let mut pool = StringPool::new();
        let sym = pool.intern(&text);
        let table = PieceTable::from_blob(&pool, sym);

        let lines = lines_of(&text);
        prop_assume!(at <= lines.len());

        let mut delta = format!("a{} {}\n", at, payload.len()).into_bytes();
        for line in &payload {
            delta.extend_from_slice(line);
            delta.push(b'\n');
        }
        let dsym = pool.intern_vec(delta);
        let got = table.modify(&pool, dsym).unwrap().to_bytes(&pool);

        let mut want = Vec::new();
        for line in &lines[..at] {
            want.extend_from_slice(line);
        }
        for line in &payload {
            want.extend_from_slice(line);
            want.push(b'\n');
        }
        for line in &lines[at..] {
            want.extend_from_slice(line);
        }
        prop_assert_eq!(got, want);
    }
}
