//! Commit log normalization.
//!
//! CVS log messages arrive with arbitrary line endings, trailing
//! whitespace, runs of blank lines, and a mix of UTF-8 and Latin-1 bytes.
//! Both output dialects want clean UTF-8, so the normalizer:
//!
//! - splits on `\n`, `\r\n` or a lone `\r`,
//! - right-trims spaces and tabs from every line,
//! - collapses runs of blank lines into a single separator,
//! - terminates every retained line with `\n`,
//! - passes well-formed UTF-8 sequences through and re-encodes every other
//!   byte as Latin-1 (`0xC0 | c >> 6`, `0x80 | c & 0x3F`).
//!
//! The result is valid UTF-8 and the function is idempotent.

/// Continuation bytes are `0x80..=0xBF`.
#[inline]
fn is_cont_byte(b: u8) -> bool {
    (0x80..0xC0).contains(&b)
}

/// Normalizes a log message to clean UTF-8 (see module docs).
#[must_use]
pub fn normalize(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    let mut i = 0usize;
    let mut lstart = 0usize;
    let mut lend = 0usize;
    let mut pending_blank = false;

    loop {
        let at_end = i == src.len();
        let c = if at_end { b'\n' } else { src[i] };
        if !at_end {
            i += 1;
        }

        match c {
            b'\t' | b' ' if !at_end => {
                // Trailing whitespace; `lend` only advances on content.
            }
            b'\r' | b'\n' => {
                if c == b'\r' && i < src.len() && src[i] == b'\n' {
                    i += 1;
                }
                if lstart == lend {
                    pending_blank = true;
                } else {
                    if pending_blank {
                        pending_blank = false;
                        if !out.is_empty() {
                            out.push(b'\n');
                        }
                    }
                    emit_line(&mut out, &src[lstart..lend]);
                    out.push(b'\n');
                }
                if at_end {
                    return out;
                }
                lstart = i;
                lend = i;
            }
            _ => {
                lend = i;
            }
        }
    }
}

/// Emits one trimmed line, validating UTF-8 byte by byte.
fn emit_line(out: &mut Vec<u8>, line: &[u8]) {
    let mut k = 0usize;
    while k < line.len() {
        let c = line[k];
        let seq_len = if c < 0x80 {
            1
        } else if c < 0xC2 {
            0 // Stray continuation or overlong lead; re-encode.
        } else if c < 0xE0 {
            2
        } else if c < 0xF0 {
            3
        } else if c < 0xF1 {
            4
        } else {
            0
        };

        let valid = seq_len > 0
            && k + seq_len <= line.len()
            && line[k + 1..k + seq_len].iter().all(|&b| is_cont_byte(b));

        if valid {
            out.extend_from_slice(&line[k..k + seq_len]);
            k += seq_len;
        } else if c < 0x80 {
            out.push(c);
            k += 1;
        } else {
            // Treat as Latin-1 and synthesize the two-byte encoding.
            out.push(0xC0 | c >> 6);
            out.push(0x80 | (c & 0x3F));
            k += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(src: &[u8]) -> Vec<u8> {
        normalize(src)
    }

    #[test]
    fn plain_message_gains_final_newline() {
        assert_eq!(norm(b"hello"), b"hello\n");
        assert_eq!(norm(b"hello\n"), b"hello\n");
    }

    #[test]
    fn empty_and_blank_messages_collapse_to_nothing() {
        assert_eq!(norm(b""), b"");
        assert_eq!(norm(b"\n\n\n"), b"");
        assert_eq!(norm(b"   \n\t\n"), b"");
    }

    #[test]
    fn trailing_whitespace_is_trimmed() {
        assert_eq!(norm(b"hello   \n"), b"hello\n");
        assert_eq!(norm(b"hello\t\t"), b"hello\n");
        assert_eq!(norm(b"a b \n"), b"a b\n");
    }

    #[test]
    fn blank_runs_collapse_to_one_separator() {
        assert_eq!(norm(b"one\n\n\n\ntwo\n"), b"one\n\ntwo\n");
        assert_eq!(norm(b"\n\nlead\n"), b"lead\n");
        assert_eq!(norm(b"trail\n\n\n"), b"trail\n");
    }

    #[test]
    fn carriage_returns_are_line_breaks() {
        assert_eq!(norm(b"a\r\nb\r\nc"), b"a\nb\nc\n");
        assert_eq!(norm(b"a\rb"), b"a\nb\n");
    }

    #[test]
    fn latin1_bytes_become_two_byte_utf8() {
        // 0xE9 is 'é' in Latin-1.
        assert_eq!(norm(&[b'c', b'a', b'f', 0xE9, b'\n']), "café\n".as_bytes());
    }

    #[test]
    fn valid_utf8_passes_through() {
        let src = "naïve — done\n".as_bytes();
        assert_eq!(norm(src), src);
    }

    #[test]
    fn truncated_utf8_is_reencoded_per_byte() {
        // 0xC3 with no continuation byte.
        let out = norm(&[0xC3, b'\n']);
        assert_eq!(out, [0xC3, 0x83, b'\n']);
        assert!(std::str::from_utf8(&out).is_ok());
    }

    #[test]
    fn f1_and_above_leads_are_latin1() {
        let out = norm(&[0xF5, 0x80, 0x80, 0x80, b'\n']);
        assert!(std::str::from_utf8(&out).is_ok());
        assert_eq!(&out[..2], &[0xC3, 0xB5]);
    }

    #[test]
    fn output_is_valid_utf8_for_arbitrary_bytes() {
        let src: Vec<u8> = (0u8..=255).collect();
        let out = norm(&src);
        assert!(std::str::from_utf8(&out).is_ok());
    }

    #[test]
    fn normalization_is_idempotent() {
        for src in [
            &b"one\n\n\ntwo  \r\nthree"[..],
            &[0xE9, b' ', 0xC3, 0xA9, b'\n', b'\n', b'x'][..],
            b"",
            b"\r\r\n\r",
        ] {
            let once = norm(src);
            let twice = norm(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn no_consecutive_blank_lines_in_output() {
        let out = norm(b"a\n\n\n\nb\n\n\nc\n");
        assert_eq!(out, b"a\n\nb\n\nc\n");
        // Single blank separators survive; runs of blank lines do not.
        assert!(!out.windows(3).any(|w| w == b"\n\n\n"));
    }
}
