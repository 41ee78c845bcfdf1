//! Property tests for log normalization.
//!
//! # Invariants
//! - The output is always valid UTF-8, whatever bytes go in.
//! - Normalization is idempotent.
//! - The output never contains consecutive blank lines and every retained
//!   line ends with `\n`.

use proptest::prelude::*;

use cvscvt::logmsg::normalize;

/// Mixes plain ASCII, whitespace runs and arbitrary high bytes.
fn log_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(
        prop_oneof![
            4 => prop::char::range('a', 'z').prop_map(|c| c as u8),
            2 => Just(b' '),
            1 => Just(b'\t'),
            2 => Just(b'\n'),
            1 => Just(b'\r'),
            2 => any::<u8>(),
        ],
        0..256,
    )
}

proptest! {
    #[test]
    fn output_is_valid_utf8(src in log_bytes()) {
        let out = normalize(&src);
        prop_assert!(std::str::from_utf8(&out).is_ok());
    }

    #[test]
    fn normalization_is_idempotent(src in log_bytes()) {
        let once = normalize(&src);
        let twice = normalize(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn no_blank_runs_and_lines_are_terminated(src in log_bytes()) {
        let out = normalize(&src);
        // A single blank line may separate paragraphs; longer runs are
        // collapsed away.
        prop_assert!(!out.windows(3).any(|w| w == b"\n\n\n"));
        if !out.is_empty() {
            prop_assert_eq!(*out.last().unwrap(), b'\n');
            prop_assert_ne!(out[0], b'\n');
        }
    }

    #[test]
    fn lines_carry_no_trailing_spaces(src in log_bytes()) {
        let out = normalize(&src);
        let text = std::str::from_utf8(&out).unwrap();
        for line in text.lines() {
            prop_assert!(!line.ends_with(' ') && !line.ends_with('\t'));
        }
    }
}
