//! RCS keyword unexpansion.
//!
//! Checked-out RCS files carry expanded keywords such as
//! `$Id: foo.c,v 1.2 ... $`. The expansion is environment noise, not
//! history, so revision texts are rewritten back to the bare `$Id$` form
//! before they are stored. Only configured keyword names are rewritten;
//! everything else passes through untouched.
//!
//! An occurrence is `$NAME:` followed by any bytes up to the next `$`, with
//! no newline in between. The scan is a single pass over the text.

/// The keyword names to unexpand.
#[derive(Debug, Default)]
pub struct KeywordSet {
    names: Vec<Vec<u8>>,
}

/// Keywords RCS expands by default.
pub const DEFAULT_KEYWORDS: [&str; 11] = [
    "Author", "Date", "Header", "Id", "Locker", "Log", "Name", "RCSfile", "Revision", "Source",
    "State",
];

impl KeywordSet {
    /// An empty set; nothing is rewritten.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard RCS keyword list.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut set = Self::new();
        for name in DEFAULT_KEYWORDS {
            set.add(name);
        }
        set
    }

    /// Adds one keyword name.
    pub fn add(&mut self, name: &str) {
        self.names.push(name.as_bytes().to_vec());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn contains(&self, name: &[u8]) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

/// Rewrites `$NAME: ...$` to `$NAME$` for every configured keyword.
#[must_use]
pub fn unexpand(src: &[u8], keywords: &KeywordSet) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    let mut si = 0usize;
    while si < src.len() {
        let c = src[si];
        out.push(c);
        si += 1;
        if c != b'$' {
            continue;
        }

        // Candidate keyword: letters, then a colon, then anything up to
        // the closing dollar on the same line.
        let mut sk = si;
        while sk < src.len() && src[sk].is_ascii_alphabetic() {
            sk += 1;
        }
        let colon = sk;
        if sk == src.len() || src[sk] != b':' {
            continue;
        }
        sk += 1;

        let mut closed = false;
        while sk < src.len() {
            let b = src[sk];
            if b == b'\n' {
                break;
            }
            sk += 1;
            if b == b'$' {
                closed = true;
                break;
            }
        }
        if !closed {
            continue;
        }

        let name = &src[si..colon];
        if keywords.contains(name) {
            out.extend_from_slice(name);
            out.push(b'$');
            si = sk;
        }
    }
    out
}
