//! Pipeline driver.
//!
//! A [`Converter`] owns every pool and arena for one run plus the output
//! sink. Callers feed it archives one at a time (the directory walker in
//! the binary, or in-memory buffers in tests) and then call
//! [`Converter::finish`], which clusters, splits, schedules, resolves tags
//! and emits the stream.
//!
//! In git mode blob records are emitted while archives are fed, so each
//! revision's reconstructed text can be dropped immediately; in svn mode
//! the texts are retained on their revisions because emission order is
//! decoupled from parsing order.

use std::fmt;
use std::io;
use std::path::PathBuf;

use tracing::info;

use crate::cluster;
use crate::date::Date;
use crate::emit::{git, svn, Sink};
use crate::intern::StringPool;
use crate::model::{ChangesetPool, DirId, FileId, Model, RevState, SetId, TagId, TagPool};
use crate::options::{OptionError, Options, OutputFormat};
use crate::piece_table::{DeltaError, PieceTable};
use crate::rcs::{self, RcsError, Syms};
use crate::revnum::RevPool;
use crate::schedule::{self, CycleError};
use crate::tags;

/// Fatal conversion errors.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    Options(OptionError),
    /// Reading the input tree failed.
    Walk { path: PathBuf, source: io::Error },
    /// An archive failed to parse.
    Archive { path: String, source: RcsError },
    /// A revision delta failed to apply.
    Delta {
        path: String,
        rev: String,
        source: DeltaError,
    },
    /// Writing the output stream failed.
    Emit(io::Error),
    /// The changeset graph contained a cycle.
    Cycle(CycleError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Options(e) => e.fmt(f),
            Self::Walk { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Archive { path, source } => write!(f, "{path}: {source}"),
            Self::Delta { path, rev, source } => write!(f, "{path} {rev}: {source}"),
            Self::Emit(source) => write!(f, "writing output failed: {source}"),
            Self::Cycle(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Options(e) => Some(e),
            Self::Walk { source, .. } => Some(source),
            Self::Archive { source, .. } => Some(source),
            Self::Delta { source, .. } => Some(source),
            Self::Emit(source) => Some(source),
            Self::Cycle(e) => Some(e),
        }
    }
}

impl From<OptionError> for Error {
    fn from(e: OptionError) -> Self {
        Self::Options(e)
    }
}

impl From<CycleError> for Error {
    fn from(e: CycleError) -> Self {
        Self::Cycle(e)
    }
}

/// Counters reported after a conversion.
#[derive(Clone, Copy, Debug, Default)]
pub struct Stats {
    pub files: usize,
    pub revisions: usize,
    pub trunk_revisions: usize,
    pub changesets: usize,
    pub commits: usize,
    pub tags: usize,
}

/// One conversion run: pools, arenas, options and the output sink.
pub struct Converter<S: Sink> {
    opts: Options,
    pool: StringPool,
    syms: Syms,
    revnums: RevPool,
    model: Model,
    changesets: ChangesetPool,
    tags: TagPool,
    marks: u32,
    stats: Stats,
    sink: S,
}

impl<S: Sink> Converter<S> {
    pub fn new(opts: Options, sink: S) -> Self {
        let mut pool = StringPool::new();
        let syms = Syms::new(&mut pool);
        Self {
            opts,
            pool,
            syms,
            revnums: RevPool::new(),
            model: Model::new(),
            changesets: ChangesetPool::new(),
            tags: TagPool::new(),
            marks: 0,
            stats: Stats::default(),
            sink,
        }
    }

    /// The options this run was configured with.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.opts
    }

    /// The synthetic root directory.
    #[inline]
    #[must_use]
    pub fn root_dir(&self) -> DirId {
        self.model.root()
    }

    /// Finds or creates a subdirectory; the walker mirrors the input tree
    /// through this.
    pub fn subdir(&mut self, parent: DirId, name: &[u8]) -> DirId {
        self.model.subdir(parent, name)
    }

    /// Feeds one archive. `name` is the working-file name, without the
    /// `,v` suffix and without any `Attic` component.
    pub fn add_archive(
        &mut self,
        dir: DirId,
        name: &[u8],
        executable: bool,
        in_attic: bool,
        bytes: &[u8],
    ) -> Result<FileId, Error> {
        let file = self.model.add_file(dir, name, executable);
        self.stats.files += 1;

        let counts = rcs::parse_archive(
            bytes,
            &mut self.pool,
            &self.syms,
            &mut self.revnums,
            &mut self.model,
            &mut self.changesets,
            &mut self.tags,
            &self.opts.keywords,
            file,
            in_attic,
        )
        .map_err(|source| Error::Archive {
            path: self.model.file_path_lossy(file),
            source,
        })?;
        self.stats.revisions += counts.revisions;
        self.stats.trunk_revisions += counts.trunk;

        if self.opts.verbose {
            info!("{}", self.model.file_path_lossy(file));
        }

        self.materialize(file)
    }

    /// Convenience for tests and simple callers: `rel` is a `/`-separated
    /// path whose final component is the working-file name.
    pub fn add_archive_path(
        &mut self,
        rel: &str,
        executable: bool,
        in_attic: bool,
        bytes: &[u8],
    ) -> Result<FileId, Error> {
        let mut dir = self.model.root();
        let mut parts = rel.split('/').peekable();
        let mut name = "";
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                dir = self.model.subdir(dir, part.as_bytes());
            } else {
                name = part;
            }
        }
        self.add_archive(dir, name.as_bytes(), executable, in_attic, bytes)
    }

    /// Rebuilds every trunk revision's text by walking reverse deltas from
    /// the head. Git mode streams blobs as it goes; svn mode retains the
    /// piece tables for emission.
    fn materialize(&mut self, file: FileId) -> Result<FileId, Error> {
        let head = self.model.file(file).head.expect("parser sets head");
        let text = self.model.rev(head).text.expect("deltatext validated");

        match self.opts.format {
            OutputFormat::Git => {
                let mut pt = PieceTable::from_blob(&self.pool, text);
                let mut cur = head;
                loop {
                    if self.model.rev(cur).state != RevState::Dead {
                        self.marks += 1;
                        self.model.rev_mut(cur).mark = self.marks;
                        git::blob(&mut self.sink, &self.pool, self.marks, &pt)
                            .map_err(Error::Emit)?;
                    }
                    let Some(pred) = self.model.rev(cur).pred else {
                        break;
                    };
                    let delta = self.model.rev(pred).text.expect("deltatext validated");
                    pt = pt
                        .modify(&self.pool, delta)
                        .map_err(|source| self.delta_error(file, pred, source))?;
                    cur = pred;
                }
            }
            OutputFormat::Svn => {
                self.model.rev_mut(head).content = Some(PieceTable::from_blob(&self.pool, text));
                let mut cur = head;
                while let Some(pred) = self.model.rev(cur).pred {
                    let delta = self.model.rev(pred).text.expect("deltatext validated");
                    let src = self.model.rev(cur).content.as_ref().expect("just built");
                    let next = src
                        .modify(&self.pool, delta)
                        .map_err(|source| self.delta_error(file, pred, source))?;
                    self.model.rev_mut(pred).content = Some(next);
                    cur = pred;
                }
            }
        }
        Ok(file)
    }

    fn delta_error(
        &self,
        file: FileId,
        rev: crate::model::FileRevId,
        source: DeltaError,
    ) -> Error {
        Error::Delta {
            path: self.model.file_path_lossy(file),
            rev: self.revnums.format(self.model.rev(rev).rev),
            source,
        }
    }

    /// Clusters, orders and emits everything fed so far, then flushes and
    /// returns the sink.
    pub fn finish(mut self) -> Result<(S, Stats), Error> {
        let ranks = self.model.file_ranks();
        let split = cluster::split_changesets(
            &mut self.model,
            &mut self.changesets,
            &self.revnums,
            &ranks,
            self.opts.split_threshold,
        );
        let sorted = schedule::order(&self.model, &mut self.changesets, &ranks, &split)?;
        let sorted_tags = tags::resolve_tags(
            &self.model,
            &self.changesets,
            &mut self.tags,
            &self.pool,
            &self.revnums,
        );
        self.stats.changesets = split.len();

        match self.opts.format {
            OutputFormat::Git => self.emit_git(&sorted, &sorted_tags)?,
            OutputFormat::Svn => self.emit_svn(&sorted, &sorted_tags)?,
        }
        self.sink.flush().map_err(Error::Emit)?;

        info!(
            "{} files, {} file revisions, {} on trunk, {} changesets, {} commits, {} tags",
            self.stats.files,
            self.stats.revisions,
            self.stats.trunk_revisions,
            self.stats.changesets,
            self.stats.commits,
            self.stats.tags,
        );
        Ok((self.sink, self.stats))
    }

    /// A changeset that only turns dead revisions into dead revisions (or
    /// adds already-dead files) produces no visible change.
    fn dead_only(&self, set: SetId) -> bool {
        self.changesets.get(set).filerevs.iter().all(|&fr| {
            let r = self.model.rev(fr);
            r.state == RevState::Dead
                && r.pred
                    .map_or(true, |p| self.model.rev(p).state == RevState::Dead)
        })
    }

    /// Pulls a tag's members into emission order.
    fn sort_tag_members(&mut self, tag: TagId) {
        let mut members = std::mem::take(&mut self.tags.get_mut(tag).filerevs);
        tags::sort_members(&self.model, &self.changesets, &mut members);
        self.tags.get_mut(tag).filerevs = members;
    }

    fn emit_git(&mut self, sorted: &[SetId], sorted_tags: &[TagId]) -> Result<(), Error> {
        let mut ti = 0usize;
        for &set in sorted.iter().rev() {
            if self.dead_only(set) {
                continue;
            }
            self.marks += 1;
            self.changesets.get_mut(set).mark = self.marks;
            git::commit(
                &mut self.sink,
                &self.pool,
                &self.model,
                &self.changesets,
                set,
                self.marks,
                &self.opts.trunk,
                &self.opts.email_domain,
            )
            .map_err(Error::Emit)?;
            self.stats.commits += 1;

            while ti < sorted_tags.len() && self.tags.get(sorted_tags[ti]).latest == Some(set) {
                let tag = sorted_tags[ti];
                self.sort_tag_members(tag);
                git::tag(
                    &mut self.sink,
                    &self.pool,
                    &self.model,
                    &self.changesets,
                    self.tags.get(tag),
                )
                .map_err(Error::Emit)?;
                self.stats.tags += 1;
                ti += 1;
            }
        }
        git::trailer(&mut self.sink).map_err(Error::Emit)
    }

    fn emit_svn(&mut self, sorted: &[SetId], sorted_tags: &[TagId]) -> Result<(), Error> {
        svn::preamble(&mut self.sink).map_err(Error::Emit)?;

        let first_date = sorted
            .first()
            .map_or(Date::new(1970, 1, 1, 0, 0, 0), |&s| {
                self.changesets.get(s).oldest
            });
        svn::revision(
            &mut self.sink,
            1,
            first_date,
            None,
            b"Standard project directories initialized by cvscvt.",
        )
        .map_err(Error::Emit)?;
        svn::standard_dirs(&mut self.sink, &self.opts.trunk, &self.opts.tags)
            .map_err(Error::Emit)?;

        let mut dirs = svn::DirEntries::new(self.model.dir_count());
        dirs.seed(self.model.root());
        let trunk = self.opts.trunk.clone().into_bytes();
        let tags_dir = self.opts.tags.clone().into_bytes();

        let mut n_commits: u32 = 0;
        let mut n_tags: u32 = 0;
        let mut ti = 0usize;
        for &set in sorted.iter().rev() {
            if self.dead_only(set) {
                continue;
            }
            let revno = n_commits + n_tags + 2;
            self.changesets.get_mut(set).mark = revno;
            svn::commit(
                &mut self.sink,
                &self.pool,
                &self.model,
                &self.changesets,
                set,
                revno,
                &trunk,
                &mut dirs,
            )
            .map_err(Error::Emit)?;
            self.stats.commits += 1;

            while ti < sorted_tags.len() && self.tags.get(sorted_tags[ti]).latest == Some(set) {
                let revno = n_commits + n_tags + 3;
                let tag = sorted_tags[ti];
                self.sort_tag_members(tag);
                svn::tag(
                    &mut self.sink,
                    &self.pool,
                    &self.model,
                    &self.changesets,
                    self.tags.get(tag),
                    revno,
                    &trunk,
                    &tags_dir,
                )
                .map_err(Error::Emit)?;
                n_tags += 1;
                self.stats.tags += 1;
                ti += 1;
            }
            n_commits += 1;
        }
        Ok(())
    }
}
