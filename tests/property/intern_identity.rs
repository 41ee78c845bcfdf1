//! Property tests for the byte-string pool.
//!
//! # Invariants
//! - Re-interning a copy of any interned content yields the same symbol.
//! - Distinct contents never share a symbol.
//! - Interned bytes read back unchanged, across arbitrary interleavings
//!   and table growth.

use proptest::prelude::*;

use cvscvt::intern::StringPool;

proptest! {
    #[test]
    fn reinterning_a_clone_yields_the_same_symbol(inputs in prop::collection::vec(
        prop::collection::vec(any::<u8>(), 0..64),
        1..200,
    )) {
        let mut pool = StringPool::new();
        let symbols: Vec<_> = inputs.iter().map(|b| pool.intern(b)).collect();
        for (bytes, &sym) in inputs.iter().zip(&symbols) {
            let again = pool.intern(&bytes.clone());
            prop_assert_eq!(again, sym);
            prop_assert_eq!(pool.bytes(sym), &bytes[..]);
        }
    }

    #[test]
    fn symbol_equality_matches_content_equality(
        a in prop::collection::vec(any::<u8>(), 0..32),
        b in prop::collection::vec(any::<u8>(), 0..32),
    ) {
        let mut pool = StringPool::new();
        let sa = pool.intern(&a);
        let sb = pool.intern(&b);
        prop_assert_eq!(sa == sb, a == b);
    }

    #[test]
    fn growth_preserves_all_contents(count in 1usize..600) {
        let mut pool = StringPool::new();
        let symbols: Vec<_> = (0..count)
            .map(|i| pool.intern(format!("entry-{i}").as_bytes()))
            .collect();
        for (i, &sym) in symbols.iter().enumerate() {
            let expected = format!("entry-{i}");
            prop_assert_eq!(pool.bytes(sym), expected.as_bytes());
        }
        prop_assert_eq!(pool.len(), count);
    }
}
