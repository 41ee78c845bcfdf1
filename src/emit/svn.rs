//! SVN filesystem-dump dialect.
//!
//! The dump is a sequence of revision records, each a property block with
//! exact byte counts followed by node records. Property blocks are built
//! in a buffer first so the `Prop-content-length`/`Content-length` headers
//! are always exact. Directory nodes are created on the first file added
//! beneath them and removed when their last entry disappears, tracked by a
//! counter per dense directory id. Tags are separate revisions that copy
//! every live tagged file out of the trunk with `Node-copyfrom-*`.

use std::io;

use crate::date::Date;
use crate::intern::StringPool;
use crate::logmsg;
use crate::model::{ChangesetPool, DirId, FileRevId, Model, RevState, SetId, Tag};
use crate::piece_table::PieceTable;

use super::Sink;

/// Opens the stream.
pub(crate) fn preamble<S: Sink>(sink: &mut S) -> io::Result<()> {
    sink.write_all(b"SVN-fs-dump-format-version: 2\n\n")
}

fn iso_date(d: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.000000Z",
        d.year, d.month, d.day, d.hour, d.minute, d.second
    )
}

/// Builds the revision property block (`svn:author`, `svn:date`,
/// `svn:log`, `PROPS-END`).
fn prop_block(author: Option<&[u8]>, date: Date, log: &[u8]) -> Vec<u8> {
    let mut p = Vec::new();
    if let Some(author) = author {
        p.extend_from_slice(format!("K 10\nsvn:author\nV {}\n", author.len()).as_bytes());
        p.extend_from_slice(author);
        p.push(b'\n');
    }
    p.extend_from_slice(format!("K 8\nsvn:date\nV 27\n{}\n", iso_date(date)).as_bytes());
    p.extend_from_slice(format!("K 7\nsvn:log\nV {}\n", log.len()).as_bytes());
    p.extend_from_slice(log);
    p.push(b'\n');
    p.extend_from_slice(b"PROPS-END\n");
    p
}

/// Emits one revision record header with its property block.
pub(crate) fn revision<S: Sink>(
    sink: &mut S,
    revno: u32,
    date: Date,
    author: Option<&[u8]>,
    log: &[u8],
) -> io::Result<()> {
    let props = prop_block(author, date, log);
    sink.write_all(
        format!(
            "Revision-number: {revno}\nProp-content-length: {len}\nContent-length: {len}\n\n",
            len = props.len()
        )
        .as_bytes(),
    )?;
    sink.write_all(&props)?;
    sink.write_all(b"\n")
}

/// Emits the `trunk` and `tags` directory nodes of revision 1.
pub(crate) fn standard_dirs<S: Sink>(sink: &mut S, trunk: &str, tags_dir: &str) -> io::Result<()> {
    sink.write_all(
        format!("Node-path: {trunk}\nNode-kind: dir\nNode-action: add\n\n").as_bytes(),
    )?;
    sink.write_all(
        format!("Node-path: {tags_dir}\nNode-kind: dir\nNode-action: add\n\n").as_bytes(),
    )
}

/// Per-directory entry counters driving dir node creation and removal.
pub(crate) struct DirEntries {
    counts: Vec<usize>,
}

impl DirEntries {
    pub(crate) fn new(dirs: usize) -> Self {
        Self {
            counts: vec![0; dirs],
        }
    }

    /// Marks a directory as pre-existing so it is never added or removed.
    pub(crate) fn seed(&mut self, dir: DirId) {
        self.counts[dir.0 as usize] = 1;
    }

    /// Counts one new entry under `dir`, adding directory nodes bottom-up
    /// on first use.
    pub(crate) fn add<S: Sink>(
        &mut self,
        sink: &mut S,
        model: &Model,
        prefix: &[u8],
        dir: DirId,
    ) -> io::Result<()> {
        let idx = dir.0 as usize;
        self.counts[idx] += 1;
        if self.counts[idx] == 1 {
            if let Some(parent) = model.dir(dir).parent {
                self.add(sink, model, prefix, parent)?;
            }
            self.node(sink, model, prefix, dir, true)?;
        }
        Ok(())
    }

    /// Drops one entry under `dir`, deleting directory nodes top-down when
    /// the counter returns to zero.
    pub(crate) fn del<S: Sink>(
        &mut self,
        sink: &mut S,
        model: &Model,
        prefix: &[u8],
        dir: DirId,
    ) -> io::Result<()> {
        let idx = dir.0 as usize;
        self.counts[idx] -= 1;
        if self.counts[idx] == 0 {
            self.node(sink, model, prefix, dir, false)?;
            if let Some(parent) = model.dir(dir).parent {
                self.del(sink, model, prefix, parent)?;
            }
        }
        Ok(())
    }

    fn node<S: Sink>(
        &self,
        sink: &mut S,
        model: &Model,
        prefix: &[u8],
        dir: DirId,
        add: bool,
    ) -> io::Result<()> {
        sink.write_all(b"Node-path: ")?;
        sink.write_all(prefix)?;
        sink.write_all(b"/")?;
        let mut path = Vec::new();
        model.push_dir_path(&mut path, dir);
        sink.write_all(&path)?;
        if add {
            sink.write_all(b"\nNode-kind: dir\nNode-action: add\n\n")
        } else {
            sink.write_all(b"\nNode-kind: dir\nNode-action: delete\n\n")
        }
    }
}

/// Byte length of the `svn:executable` property block.
const EXEC_PROPS: &[u8] = b"K 14\nsvn:executable\nV 1\n*\nPROPS-END\n";

/// Emits one changeset as a revision with its file nodes.
#[allow(clippy::too_many_arguments)]
pub(crate) fn commit<S: Sink>(
    sink: &mut S,
    pool: &StringPool,
    model: &Model,
    changesets: &ChangesetPool,
    set: SetId,
    revno: u32,
    trunk: &[u8],
    dirs: &mut DirEntries,
) -> io::Result<()> {
    let c = changesets.get(set);
    let log = logmsg::normalize(pool.bytes(c.log));
    let author = c.author.map(|a| pool.bytes(a));
    revision(sink, revno, c.oldest, author, &log)?;

    let empty = PieceTable::default();
    let mut path = Vec::new();
    for &fr in &c.filerevs {
        let r = model.rev(fr);
        if let Some(succ) = r.succ {
            if model.rev(succ).changeset == r.changeset {
                continue;
            }
        }

        let cur_dead = r.state == RevState::Dead;
        let pred_dead = r.pred.map_or(true, |p| model.rev(p).state == RevState::Dead);
        let dir = model.file(r.file).dir;

        if pred_dead && !cur_dead {
            dirs.add(sink, model, trunk, dir)?;
        }

        path.clear();
        model.push_file_path(&mut path, r.file);

        if !cur_dead {
            sink.write_all(b"Node-path: ")?;
            sink.write_all(trunk)?;
            sink.write_all(b"/")?;
            sink.write_all(&path)?;
            sink.write_all(b"\nNode-kind: file\n")?;
            if pred_dead {
                sink.write_all(b"Node-action: add\n")?;
            } else {
                sink.write_all(b"Node-action: change\n")?;
            }

            let content = r.content.as_ref().unwrap_or(&empty);
            let text_len = content.size();
            let prop_len = if model.file(r.file).executable {
                EXEC_PROPS.len() as u64
            } else {
                0
            };

            if prop_len != 0 {
                sink.write_all(format!("Prop-content-length: {prop_len}\n").as_bytes())?;
            }
            sink.write_all(format!("Text-content-length: {text_len}\n").as_bytes())?;
            sink.write_all(format!("Content-length: {}\n\n", prop_len + text_len).as_bytes())?;
            if prop_len != 0 {
                sink.write_all(EXEC_PROPS)?;
            }
            for slice in content.iter_slices(pool) {
                sink.write_all(slice)?;
            }
        } else if !pred_dead {
            sink.write_all(b"Node-path: ")?;
            sink.write_all(trunk)?;
            sink.write_all(b"/")?;
            sink.write_all(&path)?;
            sink.write_all(b"\nNode-action: delete\n\n")?;
            dirs.del(sink, model, trunk, dir)?;
        }
    }

    sink.write_all(b"\n")
}

/// Emits a `Make tag` revision copying every live tagged file.
///
/// `tag.filerevs` must be sorted with members of older-emitted changesets
/// first; runs of members covered by one changeset share its revision
/// number as the copy source.
#[allow(clippy::too_many_arguments)]
pub(crate) fn tag<S: Sink>(
    sink: &mut S,
    pool: &StringPool,
    model: &Model,
    changesets: &ChangesetPool,
    tag: &Tag,
    revno: u32,
    trunk: &[u8],
    tags_dir: &[u8],
) -> io::Result<()> {
    let latest = changesets.get(tag.latest.expect("resolved tag"));
    revision(sink, revno, latest.oldest, None, b"Make tag\n")?;

    let mut tag_path = tags_dir.to_vec();
    tag_path.push(b'/');
    tag_path.extend_from_slice(pool.bytes(tag.name));

    let set_of =
        |fr: FileRevId| -> SetId { model.rev(fr).changeset.expect("resolved member") };

    let members = &tag.filerevs;
    let mut dirs = DirEntries::new(model.dir_count());
    let mut min = members[0];
    let mut max = model.rev(members[0]).succ;
    let mut next_out = 0usize;
    let mut i = 0usize;
    loop {
        if i == members.len() {
            let from_rev = changesets.get(set_of(min)).mark;
            copy_run(
                sink, model, &mut dirs, &tag_path, trunk, &members[next_out..i], from_rev,
            )?;
            return Ok(());
        }

        let r = members[i];
        let covered = match max {
            Some(m) => changesets.get(set_of(m)).id >= changesets.get(set_of(r)).id,
            None => false,
        };
        if covered {
            let from_rev = changesets.get(set_of(min)).mark;
            copy_run(
                sink, model, &mut dirs, &tag_path, trunk, &members[next_out..i], from_rev,
            )?;
            next_out = i;
            max = model.rev(r).succ;
        } else {
            let advance = match (max, model.rev(r).succ) {
                (None, _) => true,
                (Some(m), Some(s)) => changesets.get(set_of(m)).id < changesets.get(set_of(s)).id,
                (Some(_), None) => false,
            };
            if advance {
                max = model.rev(r).succ;
            }
        }
        min = r;
        i += 1;
    }
}

/// Copy nodes for one run of tagged revisions, all from `from_rev`.
#[allow(clippy::too_many_arguments)]
fn copy_run<S: Sink>(
    sink: &mut S,
    model: &Model,
    dirs: &mut DirEntries,
    tag_path: &[u8],
    trunk: &[u8],
    run: &[FileRevId],
    from_rev: u32,
) -> io::Result<()> {
    let mut path = Vec::new();
    for &fr in run {
        let r = model.rev(fr);
        dirs.add(sink, model, tag_path, model.file(r.file).dir)?;

        path.clear();
        model.push_file_path(&mut path, r.file);
        sink.write_all(b"Node-path: ")?;
        sink.write_all(tag_path)?;
        sink.write_all(b"/")?;
        sink.write_all(&path)?;
        sink.write_all(b"\nNode-kind: file\nNode-action: add\n")?;
        sink.write_all(format!("Node-copyfrom-rev: {from_rev}\n").as_bytes())?;
        sink.write_all(b"Node-copyfrom-path: ")?;
        sink.write_all(trunk)?;
        sink.write_all(b"/")?;
        sink.write_all(&path)?;
        sink.write_all(b"\n\n")?;
    }
    Ok(())
}
