//! Arena-allocated repository model.
//!
//! Directories, files, file revisions, changesets and tags form a cyclic
//! reference web (revision ↔ changeset, predecessor ↔ successor). All of
//! them live in flat arenas and point at each other through small index
//! handles, so the web never owns itself.
//!
//! # Invariants
//! - `dirs[0]` is the synthetic root; every other directory has a parent
//!   and `depth == parent.depth + 1`.
//! - `rev.pred`/`rev.succ` link adjacent trunk revisions of one file, with
//!   `succ` on the newer side.
//! - A directory's arena index doubles as its dense id for the per-directory
//!   entry counters used during svn emission.

use std::cmp::Ordering;

use ahash::AHashMap;

use crate::date::Date;
use crate::intern::Symbol;
use crate::piece_table::PieceTable;
use crate::revnum::RevId;

/// Handle to a [`Directory`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DirId(pub u32);

/// Handle to a [`File`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FileId(pub u32);

/// Handle to a [`FileRev`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FileRevId(pub u32);

/// Handle to a [`Changeset`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SetId(pub u32);

/// Handle to a [`Tag`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TagId(pub u32);

/// A directory in the converted tree.
#[derive(Debug)]
pub struct Directory {
    pub name: Vec<u8>,
    pub parent: Option<DirId>,
    pub depth: u32,
}

/// A versioned file (one `,v` archive).
#[derive(Debug)]
pub struct File {
    pub name: Vec<u8>,
    pub dir: DirId,
    pub executable: bool,
    pub head: Option<FileRevId>,
}

/// Revision state recorded by RCS.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RevState {
    Dead,
    #[default]
    Exp,
}

/// One trunk revision of one file.
#[derive(Debug)]
pub struct FileRev {
    pub file: FileId,
    pub rev: RevId,
    pub date: Date,
    pub author: Option<Symbol>,
    pub state: RevState,
    pub log: Option<Symbol>,
    pub text: Option<Symbol>,
    pub pred: Option<FileRevId>,
    pub succ: Option<FileRevId>,
    pub changeset: Option<SetId>,
    pub mark: u32,
    /// Reconstructed content, retained only for svn emission.
    pub content: Option<PieceTable>,
}

impl FileRev {
    fn new(file: FileId, rev: RevId) -> Self {
        Self {
            file,
            rev,
            date: Date::default(),
            author: None,
            state: RevState::default(),
            log: None,
            text: None,
            pred: None,
            succ: None,
            changeset: None,
            mark: 0,
            content: None,
        }
    }
}

/// An inferred commit: revisions sharing one log message and author.
#[derive(Debug)]
pub struct Changeset {
    pub log: Symbol,
    pub author: Option<Symbol>,
    pub oldest: Date,
    pub filerevs: Vec<FileRevId>,
    /// Changesets that still depend on this one during scheduling.
    pub n_succ: u32,
    /// Dense position in the scheduled order; 0 is the newest commit.
    pub id: u32,
    pub mark: u32,
}

impl Changeset {
    fn new(log: Symbol, author: Option<Symbol>) -> Self {
        Self {
            log,
            author,
            oldest: Date::MAX,
            filerevs: Vec::new(),
            n_succ: 0,
            id: 0,
            mark: 0,
        }
    }
}

/// A symbolic name attached to trunk revisions across files.
#[derive(Debug)]
pub struct Tag {
    pub name: Symbol,
    pub filerevs: Vec<FileRevId>,
    /// Most recently emitted changeset touching a tagged revision.
    pub latest: Option<SetId>,
}

/// The directory/file/revision arenas for one conversion run.
#[derive(Default)]
pub struct Model {
    pub dirs: Vec<Directory>,
    pub files: Vec<File>,
    pub revs: Vec<FileRev>,
    dir_index: AHashMap<(DirId, Vec<u8>), DirId>,
}

impl Model {
    /// Creates a model containing only the synthetic root directory.
    #[must_use]
    pub fn new() -> Self {
        let mut model = Self::default();
        model.dirs.push(Directory {
            name: Vec::new(),
            parent: None,
            depth: 0,
        });
        model
    }

    /// The synthetic root directory.
    #[inline]
    #[must_use]
    pub const fn root(&self) -> DirId {
        DirId(0)
    }

    /// Number of directories, for dense per-directory counters.
    #[inline]
    #[must_use]
    pub fn dir_count(&self) -> usize {
        self.dirs.len()
    }

    #[inline]
    #[must_use]
    pub fn dir(&self, id: DirId) -> &Directory {
        &self.dirs[id.0 as usize]
    }

    #[inline]
    #[must_use]
    pub fn file(&self, id: FileId) -> &File {
        &self.files[id.0 as usize]
    }

    #[inline]
    pub fn file_mut(&mut self, id: FileId) -> &mut File {
        &mut self.files[id.0 as usize]
    }

    #[inline]
    #[must_use]
    pub fn rev(&self, id: FileRevId) -> &FileRev {
        &self.revs[id.0 as usize]
    }

    #[inline]
    pub fn rev_mut(&mut self, id: FileRevId) -> &mut FileRev {
        &mut self.revs[id.0 as usize]
    }

    /// Finds or creates the child directory `name` under `parent`.
    pub fn subdir(&mut self, parent: DirId, name: &[u8]) -> DirId {
        if let Some(&id) = self.dir_index.get(&(parent, name.to_vec())) {
            return id;
        }
        let id = DirId(self.dirs.len() as u32);
        self.dirs.push(Directory {
            name: name.to_vec(),
            parent: Some(parent),
            depth: self.dir(parent).depth + 1,
        });
        self.dir_index.insert((parent, name.to_vec()), id);
        id
    }

    /// Creates a file record; the caller parses its archive afterwards.
    pub fn add_file(&mut self, dir: DirId, name: &[u8], executable: bool) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push(File {
            name: name.to_vec(),
            dir,
            executable,
            head: None,
        });
        id
    }

    /// Allocates a bare file revision.
    pub fn add_rev(&mut self, file: FileId, rev: RevId) -> FileRevId {
        let id = FileRevId(self.revs.len() as u32);
        self.revs.push(FileRev::new(file, rev));
        id
    }

    /// Appends `dir/.../name` for a file to `out`.
    pub fn push_file_path(&self, out: &mut Vec<u8>, file: FileId) {
        let f = self.file(file);
        self.push_dir_path(out, f.dir);
        out.extend_from_slice(&f.name);
    }

    /// Appends the directory chain with a trailing slash per component.
    pub fn push_dir_path(&self, out: &mut Vec<u8>, dir: DirId) {
        let d = self.dir(dir);
        if let Some(parent) = d.parent {
            self.push_dir_path(out, parent);
            out.extend_from_slice(&d.name);
            out.push(b'/');
        }
    }

    /// Display path of a file for diagnostics.
    #[must_use]
    pub fn file_path_lossy(&self, file: FileId) -> String {
        let mut buf = Vec::new();
        self.push_file_path(&mut buf, file);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Orders two directories of equal depth along their name chains.
    fn cmp_dirs(&self, a: DirId, b: DirId) -> Ordering {
        debug_assert_eq!(self.dir(a).depth, self.dir(b).depth);
        if a == b {
            return Ordering::Equal;
        }
        let (da, db) = (self.dir(a), self.dir(b));
        if da.parent == db.parent {
            da.name.cmp(&db.name)
        } else {
            // Distinct parents exist whenever the dirs are distinct and
            // share a depth above zero.
            self.cmp_dirs(da.parent.expect("non-root"), db.parent.expect("non-root"))
        }
    }

    fn ancestor_at(&self, mut dir: DirId, depth: u32) -> DirId {
        while self.dir(dir).depth != depth {
            dir = self.dir(dir).parent.expect("depth underflow");
        }
        dir
    }

    /// Dictionary order along the path, comparing directory chains after
    /// equalizing depths.
    ///
    /// A file whose name equals a sibling directory's name on the other
    /// path compares equal; stable sorts keep such entries in input order.
    #[must_use]
    pub fn cmp_files(&self, a: FileId, b: FileId) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        let (fa, fb) = (self.file(a), self.file(b));
        if fa.dir == fb.dir {
            return fa.name.cmp(&fb.name);
        }
        let (depth_a, depth_b) = (self.dir(fa.dir).depth, self.dir(fb.dir).depth);
        if depth_a < depth_b {
            let anc = self.ancestor_at(fb.dir, depth_a + 1);
            if self.dir(anc).parent == Some(fa.dir) {
                fa.name.cmp(&self.dir(anc).name)
            } else {
                self.cmp_dirs(fa.dir, self.dir(anc).parent.expect("non-root"))
            }
        } else if depth_b < depth_a {
            let anc = self.ancestor_at(fa.dir, depth_b + 1);
            if self.dir(anc).parent == Some(fb.dir) {
                self.dir(anc).name.cmp(&fb.name)
            } else {
                self.cmp_dirs(self.dir(anc).parent.expect("non-root"), fb.dir)
            }
        } else {
            self.cmp_dirs(fa.dir, fb.dir)
        }
    }

    /// Ranks every file by path order; used as a deterministic sort key.
    #[must_use]
    pub fn file_ranks(&self) -> Vec<u32> {
        let mut order: Vec<FileId> = (0..self.files.len() as u32).map(FileId).collect();
        order.sort_by(|&a, &b| self.cmp_files(a, b));
        let mut ranks = vec![0u32; self.files.len()];
        for (rank, id) in order.iter().enumerate() {
            ranks[id.0 as usize] = rank as u32;
        }
        ranks
    }
}

/// Changeset arena plus the `(log, author)` grouping index.
#[derive(Default)]
pub struct ChangesetPool {
    pub sets: Vec<Changeset>,
    index: AHashMap<(Symbol, Option<Symbol>), SetId>,
}

impl ChangesetPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, id: SetId) -> &Changeset {
        &self.sets[id.0 as usize]
    }

    #[inline]
    pub fn get_mut(&mut self, id: SetId) -> &mut Changeset {
        &mut self.sets[id.0 as usize]
    }

    /// Number of changesets allocated so far, split fragments included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Finds or creates the changeset for `(log, author)`.
    pub fn group(&mut self, log: Symbol, author: Option<Symbol>) -> SetId {
        if let Some(&id) = self.index.get(&(log, author)) {
            return id;
        }
        let id = self.fresh(log, author);
        self.index.insert((log, author), id);
        id
    }

    /// Creates a split fragment outside the grouping index.
    pub fn fresh(&mut self, log: Symbol, author: Option<Symbol>) -> SetId {
        let id = SetId(self.sets.len() as u32);
        self.sets.push(Changeset::new(log, author));
        id
    }

    /// Adds a revision, folding its date into the changeset's oldest bound.
    pub fn add_rev(&mut self, id: SetId, rev: FileRevId, model: &mut Model) {
        let date = model.rev(rev).date;
        let set = self.get_mut(id);
        if date < set.oldest {
            set.oldest = date;
        }
        set.filerevs.push(rev);
        model.rev_mut(rev).changeset = Some(id);
    }
}

/// Tag arena plus the name index.
#[derive(Default)]
pub struct TagPool {
    pub tags: Vec<Tag>,
    index: AHashMap<Symbol, TagId>,
}

impl TagPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, id: TagId) -> &Tag {
        &self.tags[id.0 as usize]
    }

    #[inline]
    pub fn get_mut(&mut self, id: TagId) -> &mut Tag {
        &mut self.tags[id.0 as usize]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Finds or creates the tag named `name` and records `rev` under it.
    pub fn add_rev(&mut self, name: Symbol, rev: FileRevId) {
        let id = match self.index.get(&name) {
            Some(&id) => id,
            None => {
                let id = TagId(self.tags.len() as u32);
                self.tags.push(Tag {
                    name,
                    filerevs: Vec::new(),
                    latest: None,
                });
                self.index.insert(name, id);
                id
            }
        };
        self.tags[id.0 as usize].filerevs.push(rev);
    }
}
