//! Revision text reconstruction over interned blobs.
//!
//! A piece table represents one revision's full text as an ordered list of
//! `(symbol, offset, length)` slices into interned text blobs. Pieces never
//! own bytes; applying a delta builds a new table that mixes pieces of the
//! source table with pieces of the delta payload.
//!
//! RCS deltas are line oriented. `set` therefore splits the initial blob at
//! every `\n` so each piece is one line (a final piece may lack the
//! terminator), and `modify` walks `a`/`d` commands with a cursor over the
//! source lines:
//!
//! ```text
//! a L N\n<N lines>   insert N payload lines after source line L
//! d L N\n            delete N source lines starting at line L (1-based)
//! ```
//!
//! Commands must be ordered; a command reaching behind the cursor or past
//! the end of the source is a fatal format error.

use std::fmt;

use memchr::memchr_iter;

use crate::intern::{StringPool, Symbol};

/// One slice of an interned blob.
#[derive(Clone, Copy, Debug)]
struct Piece {
    src: Symbol,
    off: u32,
    len: u32,
}

/// Errors for malformed RCS deltas.
#[derive(Debug)]
#[non_exhaustive]
pub enum DeltaError {
    /// The delta ends inside a command or payload.
    Truncated,
    /// A command byte other than `a` or `d`.
    BadCommand { byte: u8 },
    /// A count of zero lines.
    ZeroCount,
    /// A line number behind the cursor or beyond the source.
    LineOutOfRange { line: u64 },
    /// Delete running past the end of the source.
    DeleteOverrun { line: u64, count: u64 },
    /// A line number too large to represent.
    Overflow,
    /// Missing the single space between line number and count.
    MissingSeparator,
    /// Missing the newline terminating a command.
    MissingNewline,
}

impl fmt::Display for DeltaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => f.write_str("malformed delta: truncated"),
            Self::BadCommand { byte } => {
                write!(f, "malformed delta: unknown command 0x{byte:02x}")
            }
            Self::ZeroCount => f.write_str("malformed delta: zero line count"),
            Self::LineOutOfRange { line } => {
                write!(f, "malformed delta: line {line} out of range")
            }
            Self::DeleteOverrun { line, count } => {
                write!(f, "malformed delta: delete of {count} lines at {line} overruns source")
            }
            Self::Overflow => f.write_str("malformed delta: line number overflow"),
            Self::MissingSeparator => f.write_str("malformed delta: missing space"),
            Self::MissingNewline => f.write_str("malformed delta: missing newline"),
        }
    }
}

impl std::error::Error for DeltaError {}

/// A revision's text as slices over interned blobs.
#[derive(Debug, Default)]
pub struct PieceTable {
    pieces: Vec<Piece>,
    size: u64,
}

impl PieceTable {
    /// Builds the table for a full-text blob, one piece per line.
    #[must_use]
    pub fn from_blob(pool: &StringPool, text: Symbol) -> Self {
        let bytes = pool.bytes(text);
        let mut pieces = Vec::new();
        let mut start = 0usize;
        for nl in memchr_iter(b'\n', bytes) {
            pieces.push(Piece {
                src: text,
                off: start as u32,
                len: (nl + 1 - start) as u32,
            });
            start = nl + 1;
        }
        if start != bytes.len() {
            pieces.push(Piece {
                src: text,
                off: start as u32,
                len: (bytes.len() - start) as u32,
            });
        }
        Self {
            pieces,
            size: bytes.len() as u64,
        }
    }

    /// Total byte count of the represented text.
    #[inline]
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Number of lines (pieces).
    #[inline]
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.pieces.len()
    }

    /// Applies the RCS delta in `delta` to `self`, producing the older
    /// revision's table.
    pub fn modify(&self, pool: &StringPool, delta: Symbol) -> Result<Self, DeltaError> {
        let bytes = pool.bytes(delta);
        let mut out: Vec<Piece> = Vec::new();
        let mut total = 0u64;
        // Next source line not yet copied.
        let mut cursor = 0usize;
        let mut i = 0usize;

        while i < bytes.len() {
            let cmd = bytes[i];
            i += 1;

            let mut line = read_decimal(bytes, &mut i)?;
            if cmd == b'd' {
                if line == 0 {
                    return Err(DeltaError::LineOutOfRange { line });
                }
                line -= 1;
            }

            if line < cursor as u64 {
                return Err(DeltaError::LineOutOfRange { line });
            }
            if (self.pieces.len() as u64) < line {
                return Err(DeltaError::LineOutOfRange { line });
            }
            let line = line as usize;

            if i >= bytes.len() || bytes[i] != b' ' {
                return Err(DeltaError::MissingSeparator);
            }
            i += 1;

            let count = read_decimal(bytes, &mut i)?;
            if count == 0 {
                return Err(DeltaError::ZeroCount);
            }

            if i >= bytes.len() || bytes[i] != b'\n' {
                return Err(DeltaError::MissingNewline);
            }
            i += 1;

            while cursor != line {
                let piece = self.pieces[cursor];
                cursor += 1;
                total += u64::from(piece.len);
                out.push(piece);
            }

            match cmd {
                b'a' => {
                    let mut count = count;
                    let mut start = i;
                    loop {
                        if i == bytes.len() {
                            // Only a single final line may lack its newline.
                            if count != 1 || i == start {
                                return Err(DeltaError::Truncated);
                            }
                            total += (i - start) as u64;
                            out.push(Piece {
                                src: delta,
                                off: start as u32,
                                len: (i - start) as u32,
                            });
                            break;
                        }
                        let b = bytes[i];
                        i += 1;
                        if b == b'\n' {
                            total += (i - start) as u64;
                            out.push(Piece {
                                src: delta,
                                off: start as u32,
                                len: (i - start) as u32,
                            });
                            count -= 1;
                            if count == 0 {
                                break;
                            }
                            start = i;
                        }
                    }
                }
                b'd' => {
                    if ((self.pieces.len() - cursor) as u64) < count {
                        return Err(DeltaError::DeleteOverrun {
                            line: line as u64 + 1,
                            count,
                        });
                    }
                    cursor += count as usize;
                }
                byte => return Err(DeltaError::BadCommand { byte }),
            }
        }

        while cursor != self.pieces.len() {
            let piece = self.pieces[cursor];
            cursor += 1;
            total += u64::from(piece.len);
            out.push(piece);
        }

        Ok(Self {
            pieces: out,
            size: total,
        })
    }

    /// Writes the represented text to `out`.
    pub fn write_to(&self, pool: &StringPool, out: &mut Vec<u8>) {
        for slice in self.iter_slices(pool) {
            out.extend_from_slice(slice);
        }
    }

    /// Iterates the text as byte slices, one per piece.
    pub fn iter_slices<'p>(&'p self, pool: &'p StringPool) -> impl Iterator<Item = &'p [u8]> {
        self.pieces.iter().map(move |piece| {
            let data = pool.bytes(piece.src);
            let start = piece.off as usize;
            &data[start..start + piece.len as usize]
        })
    }

    /// Collects the represented text into a fresh buffer.
    #[must_use]
    pub fn to_bytes(&self, pool: &StringPool) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size as usize);
        self.write_to(pool, &mut out);
        out
    }
}

/// Reads a (possibly empty) ASCII decimal run; an empty run is zero, which
/// mirrors how RCS tools treat a missing number.
fn read_decimal(bytes: &[u8], i: &mut usize) -> Result<u64, DeltaError> {
    let mut value = 0u64;
    while *i < bytes.len() && bytes[*i].is_ascii_digit() {
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(bytes[*i] - b'0')))
            .ok_or(DeltaError::Overflow)?;
        *i += 1;
    }
    if *i == bytes.len() {
        return Err(DeltaError::Truncated);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pool: &mut StringPool, text: &[u8]) -> PieceTable {
        let sym = pool.intern(text);
        PieceTable::from_blob(pool, sym)
    }

    fn apply(pool: &mut StringPool, src: &PieceTable, delta: &[u8]) -> Result<Vec<u8>, DeltaError> {
        let sym = pool.intern(delta);
        Ok(src.modify(pool, sym)?.to_bytes(pool))
    }

    #[test]
    fn set_then_emit_is_identity() {
        let mut pool = StringPool::new();
        for text in [
            &b""[..],
            b"\n",
            b"one line\n",
            b"two\nlines\n",
            b"no trailing newline",
            b"mixed\nend",
        ] {
            let t = table(&mut pool, text);
            assert_eq!(t.to_bytes(&pool), text);
            assert_eq!(t.size(), text.len() as u64);
        }
    }

    #[test]
    fn line_counting() {
        let mut pool = StringPool::new();
        assert_eq!(table(&mut pool, b"").line_count(), 0);
        assert_eq!(table(&mut pool, b"a\n").line_count(), 1);
        assert_eq!(table(&mut pool, b"a\nb").line_count(), 2);
    }

    #[test]
    fn delete_first_line() {
        let mut pool = StringPool::new();
        let src = table(&mut pool, b"first\nsecond\n");
        let out = apply(&mut pool, &src, b"d1 1\n").unwrap();
        assert_eq!(out, b"second\n");
    }

    #[test]
    fn delete_all_lines() {
        let mut pool = StringPool::new();
        let src = table(&mut pool, b"a\nb\nc\n");
        let out = apply(&mut pool, &src, b"d1 3\n").unwrap();
        assert_eq!(out, b"");
    }

    #[test]
    fn append_at_top_and_bottom() {
        let mut pool = StringPool::new();
        let src = table(&mut pool, b"mid\n");
        let out = apply(&mut pool, &src, b"a0 1\ntop\n").unwrap();
        assert_eq!(out, b"top\nmid\n");

        let out = apply(&mut pool, &src, b"a1 1\nbottom\n").unwrap();
        assert_eq!(out, b"mid\nbottom\n");
    }

    #[test]
    fn combined_delete_then_add() {
        let mut pool = StringPool::new();
        let src = table(&mut pool, b"a\nb\nc\nd\n");
        // Replace line 2 and append after line 3.
        let out = apply(&mut pool, &src, b"d2 1\na2 1\nB\na3 1\nX\n").unwrap();
        assert_eq!(out, b"a\nB\nc\nX\nd\n");
    }

    #[test]
    fn final_payload_line_may_lack_newline_only_when_single() {
        let mut pool = StringPool::new();
        let src = table(&mut pool, b"a\n");
        let out = apply(&mut pool, &src, b"a1 1\ntail").unwrap();
        assert_eq!(out, b"a\ntail");

        let err = apply(&mut pool, &src, b"a1 2\none\ntwo").unwrap_err();
        assert!(matches!(err, DeltaError::Truncated));
    }

    #[test]
    fn commands_behind_cursor_are_rejected() {
        let mut pool = StringPool::new();
        let src = table(&mut pool, b"a\nb\nc\n");
        let err = apply(&mut pool, &src, b"d3 1\nd1 1\n").unwrap_err();
        assert!(matches!(err, DeltaError::LineOutOfRange { .. }));
    }

    #[test]
    fn delete_past_end_is_rejected() {
        let mut pool = StringPool::new();
        let src = table(&mut pool, b"a\nb\n");
        let err = apply(&mut pool, &src, b"d2 5\n").unwrap_err();
        assert!(matches!(err, DeltaError::DeleteOverrun { .. }));
    }

    #[test]
    fn zero_count_is_rejected() {
        let mut pool = StringPool::new();
        let src = table(&mut pool, b"a\n");
        let err = apply(&mut pool, &src, b"d1 0\n").unwrap_err();
        assert!(matches!(err, DeltaError::ZeroCount));
    }

    #[test]
    fn unknown_command_is_rejected() {
        let mut pool = StringPool::new();
        let src = table(&mut pool, b"a\n");
        let err = apply(&mut pool, &src, b"x1 1\n").unwrap_err();
        assert!(matches!(err, DeltaError::BadCommand { byte: b'x' }));
    }

    #[test]
    fn empty_delta_copies_source() {
        let mut pool = StringPool::new();
        let src = table(&mut pool, b"keep\nme\n");
        let out = apply(&mut pool, &src, b"").unwrap();
        assert_eq!(out, b"keep\nme\n");
    }

    #[test]
    fn result_depends_only_on_content() {
        // Two sources with identical concatenations produce identical
        // results for the same delta, regardless of piece boundaries.
        let mut pool = StringPool::new();
        let direct = table(&mut pool, b"a\nb\nc\n");

        let head = table(&mut pool, b"z\na\nb\nc\n");
        let sym = pool.intern(b"d1 1\n");
        let derived = head.modify(&pool, sym).unwrap();
        assert_eq!(derived.to_bytes(&pool), direct.to_bytes(&pool));

        let delta = pool.intern(b"d2 1\na2 1\nB\n");
        let out_a = direct.modify(&pool, delta).unwrap().to_bytes(&pool);
        let out_b = derived.modify(&pool, delta).unwrap().to_bytes(&pool);
        assert_eq!(out_a, out_b);
    }
}
