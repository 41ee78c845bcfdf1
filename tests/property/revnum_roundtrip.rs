//! Property tests for revision-number interning.
//!
//! # Invariants
//! - `parse(format(r))` returns the identical handle.
//! - Parsing the same spelling twice returns the identical handle.
//! - Trunk detection matches the component count.

use proptest::prelude::*;

use cvscvt::revnum::RevPool;

/// Dotted revision spellings with 1..4 `major.minor` pairs.
fn spelling() -> impl Strategy<Value = String> {
    prop::collection::vec((1u32..100, 1u32..100), 1..4).prop_map(|pairs| {
        pairs
            .iter()
            .map(|(a, b)| format!("{a}.{b}"))
            .collect::<Vec<_>>()
            .join(".")
    })
}

proptest! {
    #[test]
    fn format_parse_round_trips(s in spelling()) {
        let mut pool = RevPool::new();
        let rev = pool.parse(s.as_bytes()).unwrap();
        let rendered = pool.format(rev);
        let again = pool.parse(rendered.as_bytes()).unwrap();
        prop_assert_eq!(rev, again);
    }

    #[test]
    fn parsing_is_interned(s in spelling()) {
        let mut pool = RevPool::new();
        let a = pool.parse(s.as_bytes()).unwrap();
        let b = pool.parse(s.as_bytes()).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn trunk_iff_one_pair(pairs in prop::collection::vec((1u32..100, 1u32..100), 1..4)) {
        let s = pairs
            .iter()
            .map(|(a, b)| format!("{a}.{b}"))
            .collect::<Vec<_>>()
            .join(".");
        let mut pool = RevPool::new();
        let rev = pool.parse(s.as_bytes()).unwrap();
        prop_assert_eq!(pool.is_trunk(rev), pairs.len() == 1);
    }

    #[test]
    fn bare_numbers_parse_as_trunk(n in 1u32..10_000) {
        let mut pool = RevPool::new();
        let rev = pool.parse(n.to_string().as_bytes()).unwrap();
        prop_assert!(pool.is_trunk(rev));
        prop_assert_eq!(pool.format(rev), format!("0.{n}"));
    }
}
