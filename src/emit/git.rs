//! Git fast-import dialect.
//!
//! Blobs are streamed while archives are parsed (mark numbers interleave
//! with parsing order); commits and tag refs follow once the changeset
//! order is known. Commits carry no explicit parent: consecutive commits
//! on the trunk ref chain implicitly, which is exactly the linear history
//! being reconstructed. Tags become commits on `refs/tags/<name>` whose
//! `merge` lines point at every changeset needed to cover the tagged
//! revisions.

use std::io;

use crate::intern::StringPool;
use crate::logmsg;
use crate::model::{ChangesetPool, Model, RevState, SetId, Tag};
use crate::piece_table::PieceTable;

use super::Sink;

/// Emits one blob record for a reconstructed revision text.
pub(crate) fn blob<S: Sink>(
    sink: &mut S,
    pool: &StringPool,
    mark: u32,
    pt: &PieceTable,
) -> io::Result<()> {
    sink.write_all(b"blob\n")?;
    sink.write_all(format!("mark :{mark}\n").as_bytes())?;
    sink.write_all(format!("data {}\n", pt.size()).as_bytes())?;
    for slice in pt.iter_slices(pool) {
        sink.write_all(slice)?;
    }
    sink.write_all(b"\n")
}

/// Emits one commit on the trunk ref.
#[allow(clippy::too_many_arguments)]
pub(crate) fn commit<S: Sink>(
    sink: &mut S,
    pool: &StringPool,
    model: &Model,
    changesets: &ChangesetPool,
    set: SetId,
    mark: u32,
    trunk: &str,
    email_domain: &str,
) -> io::Result<()> {
    let c = changesets.get(set);
    let author = c.author.map_or(&b""[..], |a| pool.bytes(a));
    let log = logmsg::normalize(pool.bytes(c.log));

    sink.write_all(format!("commit refs/heads/{trunk}\n").as_bytes())?;
    sink.write_all(format!("mark :{mark}\n").as_bytes())?;
    sink.write_all(b"committer ")?;
    sink.write_all(author)?;
    sink.write_all(b" <")?;
    sink.write_all(author)?;
    sink.write_all(format!("@{email_domain}> {} +0000\n", c.oldest.unix_seconds()).as_bytes())?;
    sink.write_all(format!("data {}\n", log.len()).as_bytes())?;
    sink.write_all(&log)?;
    sink.write_all(b"\n")?;

    let mut path = Vec::new();
    for &fr in &c.filerevs {
        let r = model.rev(fr);
        // A revision fixed up within the same changeset is collapsed into
        // its successor.
        if let Some(succ) = r.succ {
            if model.rev(succ).changeset == r.changeset {
                continue;
            }
        }

        path.clear();
        model.push_file_path(&mut path, r.file);
        if r.state == RevState::Dead {
            sink.write_all(b"D ")?;
            sink.write_all(&path)?;
            sink.write_all(b"\n")?;
        } else {
            let mode: &[u8] = if model.file(r.file).executable {
                b"100755"
            } else {
                b"100644"
            };
            sink.write_all(b"M ")?;
            sink.write_all(mode)?;
            sink.write_all(format!(" :{} ", r.mark).as_bytes())?;
            sink.write_all(&path)?;
            sink.write_all(b"\n")?;
        }
    }
    Ok(())
}

/// Emits a tag as a commit on `refs/tags/<name>`.
///
/// `tag.filerevs` must already be sorted with members of older-emitted
/// changesets first. The member walk finds every run of revisions whose
/// successors stay ahead of the run and emits one `merge` per run, which
/// covers the tag with the fewest ancestor changesets.
pub(crate) fn tag<S: Sink>(
    sink: &mut S,
    pool: &StringPool,
    model: &Model,
    changesets: &ChangesetPool,
    tag: &Tag,
) -> io::Result<()> {
    let epoch = changesets
        .get(tag.latest.expect("resolved tag"))
        .oldest
        .unix_seconds();

    sink.write_all(b"commit refs/tags/")?;
    sink.write_all(pool.bytes(tag.name))?;
    sink.write_all(b"\n")?;
    sink.write_all(format!("committer cvscvt <cvscvt@invalid> {epoch} +0000\n").as_bytes())?;
    sink.write_all(b"data 9\nMake tag\n\n")?;

    let members = &tag.filerevs;
    let set_of = |fr: crate::model::FileRevId| -> SetId {
        model.rev(fr).changeset.expect("resolved member")
    };

    let mut min = members[0];
    let mut max = model.rev(members[0]).succ;
    for &r in members {
        let covered = match max {
            Some(m) => changesets.get(set_of(m)).id >= changesets.get(set_of(r)).id,
            None => false,
        };
        if covered {
            let mark = changesets.get(set_of(min)).mark;
            sink.write_all(format!("merge :{mark}\n").as_bytes())?;
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
    }
    let mark = changesets.get(set_of(min)).mark;
    sink.write_all(format!("merge :{mark}\n").as_bytes())?;

    sink.write_all(b"deleteall\n")?;

    let mut path = Vec::new();
    for &fr in members {
        let r = model.rev(fr);
        path.clear();
        model.push_file_path(&mut path, r.file);
        let mode: &[u8] = if model.file(r.file).executable {
            b"100755"
        } else {
            b"100644"
        };
        sink.write_all(b"M ")?;
        sink.write_all(mode)?;
        sink.write_all(format!(" :{} ", r.mark).as_bytes())?;
        sink.write_all(&path)?;
        sink.write_all(b"\n")?;
    }
    Ok(())
}

/// Terminates the stream.
pub(crate) fn trailer<S: Sink>(sink: &mut S) -> io::Result<()> {
    sink.write_all(b"done\n")
}
