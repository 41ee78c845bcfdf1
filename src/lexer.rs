//! Tokenizer for RCS `*,v` archives.
//!
//! RCS files are a whitespace-separated stream of punctuation, numbers,
//! identifiers and `@`-delimited strings. The lexer works on the whole
//! archive held in memory and interns every lexeme, so the parser only ever
//! handles [`Symbol`] handles.
//!
//! # Token classification
//! - `:` and `;` are their own tokens.
//! - A token starting with `0`..`9` or `.` consumes the maximal run of
//!   digits and dots. If the following byte is a visible identifier byte the
//!   token keeps growing and becomes an identifier; otherwise it is a number.
//! - Identifier bytes are `0x21..=0x7E` minus `$ , . : ; @`, plus
//!   `0xA0..=0xFF`.
//! - Strings are `@...@` with `@@` escaping a literal `@`.
//! - Any other non-whitespace byte is a fatal error.

use std::fmt;

use memchr::memchr;

use crate::intern::{StringPool, Symbol};

/// Token kinds produced by the lexer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Colon,
    Semi,
    Num,
    Id,
    Str,
    Eof,
}

impl TokenKind {
    /// Human-readable name for diagnostics.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Colon => "':'",
            Self::Semi => "';'",
            Self::Num => "number",
            Self::Id => "identifier",
            Self::Str => "string",
            Self::Eof => "end of file",
        }
    }
}

/// Errors raised while tokenizing or matching tokens.
#[derive(Debug)]
#[non_exhaustive]
pub enum LexError {
    /// A byte that fits no token class.
    InvalidByte { byte: u8, line: u32, col: u32 },
    /// An `@` string that never closes.
    UnterminatedString { line: u32 },
    /// The current token does not match what the grammar requires.
    Unexpected {
        wanted: String,
        found: TokenKind,
        line: u32,
        col: u32,
    },
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidByte { byte, line, col } => {
                write!(f, "{line}:{col}: invalid byte 0x{byte:02x} in input")
            }
            Self::UnterminatedString { line } => {
                write!(f, "{line}: unterminated string")
            }
            Self::Unexpected {
                wanted,
                found,
                line,
                col,
            } => {
                write!(
                    f,
                    "{line}:{col}: expected {wanted}, found {}",
                    found.describe()
                )
            }
        }
    }
}

impl std::error::Error for LexError {}

#[inline]
fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\x08' | b'\t' | b'\n' | b'\x0b' | b'\x0c' | b'\r' | b' ')
}

#[inline]
fn is_num_byte(b: u8) -> bool {
    b.is_ascii_digit() || b == b'.'
}

#[inline]
fn is_visible_byte(b: u8) -> bool {
    match b {
        b'$' | b',' | b'.' | b':' | b';' | b'@' => false,
        0x21..=0x7E => true,
        0xA0..=0xFF => true,
        _ => false,
    }
}

/// Tokenizer over an in-memory RCS archive.
///
/// The lexer owns the mutable borrow of the string pool for its lifetime;
/// the parser reaches the pool through [`Lexer::pool`] / [`Lexer::pool_mut`].
#[derive(Debug)]
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    line: u32,
    line_start: usize,
    kind: TokenKind,
    sym: Option<Symbol>,
    pool: &'a mut StringPool,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer and reads the first token.
    pub fn new(input: &'a [u8], pool: &'a mut StringPool) -> Result<Self, LexError> {
        let mut lx = Self {
            input,
            pos: 0,
            line: 1,
            line_start: 0,
            kind: TokenKind::Eof,
            sym: None,
            pool,
        };
        lx.next()?;
        Ok(lx)
    }

    /// Current line (1-based).
    #[inline]
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Current column (1-based, byte offset within the line).
    #[inline]
    #[must_use]
    pub fn col(&self) -> u32 {
        (self.pos - self.line_start) as u32 + 1
    }

    /// Read access to the shared string pool.
    #[inline]
    #[must_use]
    pub fn pool(&self) -> &StringPool {
        self.pool
    }

    /// Write access to the shared string pool.
    #[inline]
    pub fn pool_mut(&mut self) -> &mut StringPool {
        self.pool
    }

    /// Consumes the current token if it has the given kind.
    ///
    /// Returns the interned lexeme for `Num`, `Id` and `Str`; `None` when
    /// the token does not match. Punctuation matches are reported through
    /// [`Lexer::accept_tok`] instead, since they carry no lexeme.
    pub fn accept(&mut self, kind: TokenKind) -> Result<Option<Symbol>, LexError> {
        if self.kind == kind {
            let sym = self.sym;
            self.next()?;
            Ok(sym)
        } else {
            Ok(None)
        }
    }

    /// Consumes the current token if it is punctuation of the given kind.
    pub fn accept_tok(&mut self, kind: TokenKind) -> Result<bool, LexError> {
        if self.kind == kind {
            self.next()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Consumes the current token if it is the identifier `word`.
    pub fn accept_word(&mut self, word: Symbol) -> Result<bool, LexError> {
        if self.kind == TokenKind::Id && self.sym == Some(word) {
            self.next()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Requires the current token to have the given kind and returns its
    /// lexeme.
    pub fn expect(&mut self, kind: TokenKind) -> Result<Symbol, LexError> {
        if self.kind == kind {
            let sym = self.sym.expect("lexeme-bearing token");
            self.next()?;
            Ok(sym)
        } else {
            Err(self.unexpected(kind.describe().to_owned()))
        }
    }

    /// Requires punctuation (or end of file) of the given kind.
    pub fn expect_tok(&mut self, kind: TokenKind) -> Result<(), LexError> {
        if self.kind == kind {
            if kind != TokenKind::Eof {
                self.next()?;
            }
            Ok(())
        } else {
            Err(self.unexpected(kind.describe().to_owned()))
        }
    }

    /// Requires the identifier `word`.
    pub fn expect_word(&mut self, word: Symbol) -> Result<(), LexError> {
        if self.kind == TokenKind::Id && self.sym == Some(word) {
            self.next()?;
            Ok(())
        } else {
            let wanted = format!("'{}'", self.pool.lossy(word));
            Err(self.unexpected(wanted))
        }
    }

    fn unexpected(&self, wanted: String) -> LexError {
        LexError::Unexpected {
            wanted,
            found: self.kind,
            line: self.line,
            col: self.col(),
        }
    }

    /// Advances to the next token.
    fn next(&mut self) -> Result<(), LexError> {
        self.sym = None;

        loop {
            let Some(&c) = self.input.get(self.pos) else {
                self.kind = TokenKind::Eof;
                return Ok(());
            };

            if is_whitespace(c) {
                self.pos += 1;
                if c == b'\n' {
                    self.line += 1;
                    self.line_start = self.pos;
                }
                continue;
            }

            match c {
                b':' => {
                    self.pos += 1;
                    self.kind = TokenKind::Colon;
                    return Ok(());
                }
                b';' => {
                    self.pos += 1;
                    self.kind = TokenKind::Semi;
                    return Ok(());
                }
                b'@' => {
                    self.pos += 1;
                    return self.scan_string();
                }
                _ => return self.scan_word(c),
            }
        }
    }

    /// Scans an `@`-delimited string; `pos` sits just past the opening `@`.
    fn scan_string(&mut self) -> Result<(), LexError> {
        let input = self.input;
        let mut buf = Vec::new();
        loop {
            let Some(at) = memchr(b'@', &input[self.pos..]) else {
                return Err(LexError::UnterminatedString { line: self.line });
            };
            let chunk = &input[self.pos..self.pos + at];
            buf.extend_from_slice(chunk);
            self.track_lines(chunk, self.pos + at);
            self.pos += at + 1;

            if self.input.get(self.pos) == Some(&b'@') {
                // Doubled `@` is an escaped literal.
                buf.push(b'@');
                self.pos += 1;
            } else {
                self.kind = TokenKind::Str;
                self.sym = Some(self.pool.intern_vec(buf));
                return Ok(());
            }
        }
    }

    /// Scans a number or identifier starting with byte `c`.
    fn scan_word(&mut self, c: u8) -> Result<(), LexError> {
        let start = self.pos;
        if is_num_byte(c) {
            while self.pos < self.input.len() && is_num_byte(self.input[self.pos]) {
                self.pos += 1;
            }
            let follower = self.input.get(self.pos).copied();
            if follower.is_some_and(is_visible_byte) {
                // A digit run glued to identifier bytes is one identifier.
                self.scan_ident_tail();
                self.kind = TokenKind::Id;
            } else {
                self.kind = TokenKind::Num;
            }
        } else if is_visible_byte(c) {
            self.pos += 1;
            self.scan_ident_tail();
            self.kind = TokenKind::Id;
        } else {
            return Err(LexError::InvalidByte {
                byte: c,
                line: self.line,
                col: self.col(),
            });
        }
        self.sym = Some(self.pool.intern(&self.input[start..self.pos]));
        Ok(())
    }

    fn scan_ident_tail(&mut self) {
        while self.pos < self.input.len() && is_visible_byte(self.input[self.pos]) {
            self.pos += 1;
        }
    }

    /// Updates line accounting for a chunk ending at absolute offset `end`.
    fn track_lines(&mut self, chunk: &[u8], end: usize) {
        let newlines = memchr::memchr_iter(b'\n', chunk).count();
        if newlines > 0 {
            self.line += newlines as u32;
            let last = memchr::memrchr(b'\n', chunk).expect("counted newline");
            self.line_start = end - (chunk.len() - last) + 1;
        }
    }
}
