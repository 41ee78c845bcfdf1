//! Parser for the RCS `*,v` grammar.
//!
//! ```text
//! rcstext   ::=  admin {delta}* desc {deltatext}*
//!
//! admin     ::=  head       {num};
//!                { branch   {num}; }
//!                access     {id}*;
//!                symbols    {sym : num}*;
//!                locks      {id : num}*;  {strict  ;}
//!                { comment  {string}; }
//!                { expand   {string}; }
//!                { newphrase }*
//!
//! delta     ::=  num
//!                date       num;
//!                author     id;
//!                state      {id};
//!                branches   {num}*;
//!                next       {num};
//!
//! desc      ::=  desc       string
//!
//! deltatext ::=  num
//!                log        string
//!                { newphrase }*
//!                text       string
//! ```
//!
//! Only the trunk is modeled: branch revision numbers are parsed and
//! dropped wherever they appear. Unknown newphrases are skimmed to the
//! next `;` with a warning. After the file is consumed, the head link is
//! reconciled against the successor chain and every trunk revision is
//! required to carry a deltatext.

use std::fmt;

use ahash::AHashMap;
use tracing::{error, warn};

use crate::date::{Date, DateError};
use crate::intern::{StringPool, Symbol};
use crate::keyword::{unexpand, KeywordSet};
use crate::lexer::{LexError, Lexer, TokenKind};
use crate::model::{ChangesetPool, FileId, FileRevId, Model, RevState, TagPool};
use crate::revnum::{RevId, RevPool};

/// Fatal errors while parsing one archive.
#[derive(Debug)]
#[non_exhaustive]
pub enum RcsError {
    /// Tokenization failed or the token stream broke the grammar.
    Lex(LexError),
    /// A revision field that is not a dotted number sequence.
    InvalidRevision { lexeme: String, line: u32 },
    /// A `date` field that is not a valid RCS timestamp.
    InvalidDate { source: DateError, line: u32 },
    /// A trunk revision without a deltatext block.
    MissingDeltatext { rev: String },
}

impl fmt::Display for RcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lex(e) => e.fmt(f),
            Self::InvalidRevision { lexeme, line } => {
                write!(f, "{line}: invalid revision number '{lexeme}'")
            }
            Self::InvalidDate { source, line } => write!(f, "{line}: {source}"),
            Self::MissingDeltatext { rev } => {
                write!(f, "revision {rev} has no deltatext")
            }
        }
    }
}

impl std::error::Error for RcsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Lex(e) => Some(e),
            Self::InvalidDate { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<LexError> for RcsError {
    fn from(e: LexError) -> Self {
        Self::Lex(e)
    }
}

/// Pre-interned grammar keywords.
pub struct Syms {
    pub head: Symbol,
    pub branch: Symbol,
    pub access: Symbol,
    pub symbols: Symbol,
    pub locks: Symbol,
    pub strict: Symbol,
    pub comment: Symbol,
    pub expand: Symbol,
    pub date: Symbol,
    pub author: Symbol,
    pub state: Symbol,
    pub branches: Symbol,
    pub next: Symbol,
    pub desc: Symbol,
    pub log: Symbol,
    pub text: Symbol,
    pub dead: Symbol,
    pub exp: Symbol,
    pub expand_b: Symbol,
    pub expand_k: Symbol,
    pub expand_kv: Symbol,
    pub expand_kvl: Symbol,
    pub expand_o: Symbol,
    pub expand_v: Symbol,
}

impl Syms {
    pub fn new(pool: &mut StringPool) -> Self {
        Self {
            head: pool.add_keyword("head"),
            branch: pool.add_keyword("branch"),
            access: pool.add_keyword("access"),
            symbols: pool.add_keyword("symbols"),
            locks: pool.add_keyword("locks"),
            strict: pool.add_keyword("strict"),
            comment: pool.add_keyword("comment"),
            expand: pool.add_keyword("expand"),
            date: pool.add_keyword("date"),
            author: pool.add_keyword("author"),
            state: pool.add_keyword("state"),
            branches: pool.add_keyword("branches"),
            next: pool.add_keyword("next"),
            desc: pool.add_keyword("desc"),
            log: pool.add_keyword("log"),
            text: pool.add_keyword("text"),
            dead: pool.add_keyword("dead"),
            exp: pool.add_keyword("Exp"),
            expand_b: pool.add_keyword("b"),
            expand_k: pool.add_keyword("k"),
            expand_kv: pool.add_keyword("kv"),
            expand_kvl: pool.add_keyword("kvl"),
            expand_o: pool.add_keyword("o"),
            expand_v: pool.add_keyword("v"),
        }
    }
}

/// Revision counts for one parsed archive.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArchiveCounts {
    /// Deltas seen, branches included.
    pub revisions: usize,
    /// Deltas on the trunk.
    pub trunk: usize,
}

/// Parses one `*,v` archive into the shared model.
///
/// `file` must be a fresh [`FileId`]; on success its head link points at
/// the newest trunk revision. Warnings go to the log; anything that leaves
/// the revision graph unusable is returned as an error.
#[allow(clippy::too_many_arguments)]
pub fn parse_archive<'a>(
    input: &'a [u8],
    pool: &'a mut StringPool,
    syms: &Syms,
    revnums: &mut RevPool,
    model: &mut Model,
    changesets: &mut ChangesetPool,
    tags: &mut TagPool,
    keywords: &KeywordSet,
    file: FileId,
    in_attic: bool,
) -> Result<ArchiveCounts, RcsError> {
    let path = model.file_path_lossy(file);
    let mut parser = ArchiveParser {
        lx: Lexer::new(input, pool)?,
        syms,
        revnums,
        model,
        changesets,
        tags,
        keywords,
        file,
        path,
        in_attic,
        revs: AHashMap::new(),
        binary: false,
        counts: ArchiveCounts::default(),
    };
    parser.parse()?;
    Ok(parser.counts)
}

struct ArchiveParser<'a, 'c> {
    lx: Lexer<'a>,
    syms: &'c Syms,
    revnums: &'c mut RevPool,
    model: &'c mut Model,
    changesets: &'c mut ChangesetPool,
    tags: &'c mut TagPool,
    keywords: &'c KeywordSet,
    file: FileId,
    path: String,
    in_attic: bool,
    /// Per-file revision table keyed by interned revision number.
    revs: AHashMap<RevId, FileRevId>,
    binary: bool,
    counts: ArchiveCounts,
}

impl ArchiveParser<'_, '_> {
    fn parse(&mut self) -> Result<(), RcsError> {
        self.admin()?;
        self.deltas()?;
        self.reconcile_head();
        self.accept_newphrase(Some(self.syms.desc))?;
        self.lx.expect(TokenKind::Str)?;
        self.deltatexts()?;
        self.validate()?;
        self.lx.expect_tok(TokenKind::Eof)?;
        Ok(())
    }

    /// Finds or creates the revision record for `rev` in this file.
    fn filerev(&mut self, rev: RevId) -> FileRevId {
        match self.revs.get(&rev) {
            Some(&fr) => fr,
            None => {
                let fr = self.model.add_rev(self.file, rev);
                self.revs.insert(rev, fr);
                fr
            }
        }
    }

    fn parse_revnum(&mut self, sym: Symbol) -> Result<RevId, RcsError> {
        let bytes = self.lx.pool().bytes(sym);
        self.revnums
            .parse(bytes)
            .map_err(|_| RcsError::InvalidRevision {
                lexeme: self.lx.pool().lossy(sym).into_owned(),
                line: self.lx.line(),
            })
    }

    fn admin(&mut self) -> Result<(), RcsError> {
        self.lx.expect_word(self.syms.head)?;
        let shead = self.lx.expect(TokenKind::Num)?;
        self.lx.expect_tok(TokenKind::Semi)?;
        let head = self.parse_revnum(shead)?;
        let head = self.filerev(head);
        self.model.file_mut(self.file).head = Some(head);

        if self.lx.accept_word(self.syms.branch)? {
            self.lx.accept(TokenKind::Num)?;
            self.lx.expect_tok(TokenKind::Semi)?;
        }

        self.lx.expect_word(self.syms.access)?;
        while self.lx.accept(TokenKind::Id)?.is_some() {}
        self.lx.expect_tok(TokenKind::Semi)?;

        self.lx.expect_word(self.syms.symbols)?;
        while let Some(name) = self.lx.accept(TokenKind::Id)? {
            self.lx.expect_tok(TokenKind::Colon)?;
            let srev = self.lx.expect(TokenKind::Num)?;
            let rev = self.parse_revnum(srev)?;
            if self.revnums.is_trunk(rev) {
                let fr = self.filerev(rev);
                self.tags.add_rev(name, fr);
            }
        }
        self.lx.expect_tok(TokenKind::Semi)?;

        self.lx.expect_word(self.syms.locks)?;
        while self.lx.accept(TokenKind::Id)?.is_some() {
            self.lx.expect_tok(TokenKind::Colon)?;
            self.lx.expect(TokenKind::Num)?;
        }
        self.lx.expect_tok(TokenKind::Semi)?;
        if self.lx.accept_word(self.syms.strict)? {
            self.lx.expect_tok(TokenKind::Semi)?;
        }

        if self.lx.accept_word(self.syms.comment)? {
            self.lx.accept(TokenKind::Str)?;
            self.lx.expect_tok(TokenKind::Semi)?;
        }

        if self.lx.accept_word(self.syms.expand)? {
            if let Some(mode) = self.lx.accept(TokenKind::Str)? {
                if mode == self.syms.expand_b || mode == self.syms.expand_o {
                    self.binary = true;
                } else if mode != self.syms.expand_k
                    && mode != self.syms.expand_kv
                    && mode != self.syms.expand_kvl
                    && mode != self.syms.expand_v
                {
                    warn!(
                        "{}: invalid substitution mode '{}'; ignoring",
                        self.path,
                        self.lx.pool().lossy(mode)
                    );
                }
            }
            self.lx.expect_tok(TokenKind::Semi)?;
        }

        self.accept_newphrase(None)
    }

    fn deltas(&mut self) -> Result<(), RcsError> {
        while let Some(srev) = self.lx.accept(TokenKind::Num)? {
            self.lx.expect_word(self.syms.date)?;
            let sdate = self.lx.expect(TokenKind::Num)?;
            let date =
                Date::parse(self.lx.pool().bytes(sdate)).map_err(|source| RcsError::InvalidDate {
                    source,
                    line: self.lx.line(),
                })?;
            self.lx.expect_tok(TokenKind::Semi)?;

            self.lx.expect_word(self.syms.author)?;
            let sauthor = self.lx.expect(TokenKind::Id)?;
            self.lx.expect_tok(TokenKind::Semi)?;

            self.lx.expect_word(self.syms.state)?;
            let sstate = self.lx.accept(TokenKind::Id)?;
            self.lx.expect_tok(TokenKind::Semi)?;

            self.lx.expect_word(self.syms.branches)?;
            while self.lx.accept(TokenKind::Num)?.is_some() {}
            self.lx.expect_tok(TokenKind::Semi)?;

            self.lx.expect_word(self.syms.next)?;
            let snext = self.lx.accept(TokenKind::Num)?;
            self.lx.expect_tok(TokenKind::Semi)?;

            self.counts.revisions += 1;
            let rev = self.parse_revnum(srev)?;
            if !self.revnums.is_trunk(rev) {
                continue;
            }
            self.counts.trunk += 1;
            let fr = self.filerev(rev);

            if let Some(snext) = snext {
                let pred_rev = self.parse_revnum(snext)?;
                let prev = self.filerev(pred_rev);
                if let Some(old_succ) = self.model.rev(prev).succ {
                    warn!(
                        "{}: both {} and {} have {} as predecessor",
                        self.path,
                        self.revnums.format(self.model.rev(old_succ).rev),
                        self.revnums.format(rev),
                        self.revnums.format(pred_rev),
                    );
                }
                self.model.rev_mut(fr).pred = Some(prev);
                self.model.rev_mut(prev).succ = Some(fr);
            }

            let state = if sstate == Some(self.syms.dead) {
                RevState::Dead
            } else {
                if sstate != Some(self.syms.exp) {
                    let shown = match sstate {
                        Some(s) => self.lx.pool().lossy(s).into_owned(),
                        None => String::new(),
                    };
                    warn!(
                        "{}: {} has unknown state '{}'; treating as 'Exp'",
                        self.path,
                        self.revnums.format(rev),
                        shown
                    );
                }
                RevState::Exp
            };

            let r = self.model.rev_mut(fr);
            r.date = date;
            r.author = Some(sauthor);
            r.state = state;
        }
        Ok(())
    }

    /// Moves the head to the tail of the successor chain if the `head`
    /// directive disagrees, then applies the Attic consistency rules.
    fn reconcile_head(&mut self) {
        let head = self.model.file(self.file).head.expect("head parsed");
        if self.model.rev(head).succ.is_some() {
            let mut tail = head;
            while let Some(succ) = self.model.rev(tail).succ {
                tail = succ;
            }
            warn!(
                "{}: head is {} but latest revision is {}; using the latter as head",
                self.path,
                self.revnums.format(self.model.rev(head).rev),
                self.revnums.format(self.model.rev(tail).rev),
            );
            self.model.file_mut(self.file).head = Some(tail);
        }

        let head = self.model.file(self.file).head.expect("head parsed");
        if self.model.rev(head).author.is_none() {
            error!("{}: head revision does not exist", self.path);
        } else if self.in_attic && self.model.rev(head).state != RevState::Dead {
            warn!(
                "{}: is in Attic, but head is not dead; treating as dead",
                self.path
            );
            self.model.rev_mut(head).state = RevState::Dead;
        } else if !self.in_attic && self.model.rev(head).state == RevState::Dead {
            warn!("{}: is not in Attic, but head is dead", self.path);
        }
    }

    fn deltatexts(&mut self) -> Result<(), RcsError> {
        while let Some(srev) = self.lx.accept(TokenKind::Num)? {
            self.lx.expect_word(self.syms.log)?;
            let slog = self.lx.expect(TokenKind::Str)?;

            self.accept_newphrase(Some(self.syms.text))?;
            let mut stext = self.lx.expect(TokenKind::Str)?;
            if !self.binary {
                let clean = unexpand(self.lx.pool().bytes(stext), self.keywords);
                stext = self.lx.pool_mut().intern_vec(clean);
            }

            let rev = self.parse_revnum(srev)?;
            if !self.revnums.is_trunk(rev) {
                continue;
            }
            let fr = self.filerev(rev);
            let r = self.model.rev_mut(fr);
            r.log = Some(slog);
            r.text = Some(stext);

            let author = self.model.rev(fr).author;
            let set = self.changesets.group(slog, author);
            self.changesets.add_rev(set, fr, self.model);
        }
        Ok(())
    }

    /// Trunk revisions need a deltatext; reversed timestamps only warn.
    fn validate(&mut self) -> Result<(), RcsError> {
        let mut cur = self.model.file(self.file).head;
        while let Some(fr) = cur {
            let r = self.model.rev(fr);
            if r.text.is_none() {
                return Err(RcsError::MissingDeltatext {
                    rev: self.revnums.format(r.rev),
                });
            }
            if let Some(pred) = r.pred {
                let p = self.model.rev(pred);
                if r.date < p.date {
                    warn!(
                        "{}: timestamp of {} ({}) is older than timestamp of {} ({})",
                        self.path,
                        self.revnums.format(r.rev),
                        r.date,
                        self.revnums.format(p.rev),
                        p.date,
                    );
                }
            }
            cur = r.pred;
        }
        Ok(())
    }

    /// Skims unknown newphrases up to their terminating `;`.
    ///
    /// Stops without complaint when `stop` names the next expected
    /// grammar keyword.
    fn accept_newphrase(&mut self, stop: Option<Symbol>) -> Result<(), RcsError> {
        while let Some(sym) = self.lx.accept(TokenKind::Id)? {
            if Some(sym) == stop {
                break;
            }
            warn!(
                "{}: ignoring newphrase '{}'",
                self.path,
                self.lx.pool().lossy(sym)
            );
            loop {
                if self.lx.accept(TokenKind::Id)?.is_some()
                    || self.lx.accept(TokenKind::Num)?.is_some()
                    || self.lx.accept(TokenKind::Str)?.is_some()
                    || self.lx.accept_tok(TokenKind::Colon)?
                {
                    continue;
                }
                break;
            }
            self.lx.expect_tok(TokenKind::Semi)?;
        }
        Ok(())
    }
}
