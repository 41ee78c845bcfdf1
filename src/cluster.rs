//! Changeset splitting.
//!
//! Parsing groups file revisions by `(log, author)`, which is necessary but
//! not sufficient: the same message may have been reused days apart, and a
//! single sweep over many files may contain several revisions of one file.
//! Splitting walks each group in revision order and cuts a new fragment
//! when
//!
//! - the gap between adjacent revisions exceeds the split threshold, or
//! - a file is about to appear twice in the running fragment.
//!
//! The duplicate-file rule has one exception: when the duplicate's
//! predecessor already sits in the running fragment, the duplicate is a
//! fixup of that predecessor (the CVS `commit, fix-typo` pattern with a
//! reused message). The fixup is absorbed and its predecessor link advanced
//! to the grandparent, so the collapsed revision drops out of the emitted
//! commit while dependency tracking stays intact.
//!
//! Unsplit groups keep their changeset instance; split groups are replaced
//! by fresh fragments and the original is abandoned.

use std::cmp::Ordering;

use ahash::AHashSet;
use tracing::info;

use crate::model::{ChangesetPool, FileRevId, Model, SetId};
use crate::revnum::RevPool;

/// Orders changesets by oldest date, then by representative file.
pub(crate) fn cmp_changesets(
    model: &Model,
    sets: &ChangesetPool,
    ranks: &[u32],
    a: SetId,
    b: SetId,
) -> Ordering {
    let (ca, cb) = (sets.get(a), sets.get(b));
    ca.oldest.cmp(&cb.oldest).then_with(|| {
        let fa = model.rev(ca.filerevs[0]).file;
        let fb = model.rev(cb.filerevs[0]).file;
        ranks[fa.0 as usize].cmp(&ranks[fb.0 as usize])
    })
}

/// Orders revisions within a group: revision order for one file, else by
/// date with the file path as tiebreak.
fn cmp_filerevs(
    model: &Model,
    revnums: &RevPool,
    ranks: &[u32],
    a: FileRevId,
    b: FileRevId,
) -> Ordering {
    let (ra, rb) = (model.rev(a), model.rev(b));
    if ra.file == rb.file {
        revnums.cmp_siblings(ra.rev, rb.rev)
    } else {
        ra.date
            .cmp(&rb.date)
            .then_with(|| ranks[ra.file.0 as usize].cmp(&ranks[rb.file.0 as usize]))
    }
}

/// Splits every grouped changeset and returns the surviving fragments in
/// oldest-first group order.
pub fn split_changesets(
    model: &mut Model,
    changesets: &mut ChangesetPool,
    revnums: &RevPool,
    ranks: &[u32],
    threshold: u64,
) -> Vec<SetId> {
    let mut groups: Vec<SetId> = (0..changesets.len() as u32).map(SetId).collect();
    groups.sort_by(|&a, &b| cmp_changesets(model, changesets, ranks, a, b));

    let mut split: Vec<SetId> = Vec::with_capacity(groups.len());
    let mut contains: AHashSet<crate::model::FileId> = AHashSet::new();

    for group in groups {
        let mut revs = std::mem::take(&mut changesets.get_mut(group).filerevs);
        revs.sort_by(|&a, &b| cmp_filerevs(model, revnums, ranks, a, b));

        if !needs_split(model, &revs, threshold, &mut contains) {
            changesets.get_mut(group).filerevs = revs;
            split.push(group);
            continue;
        }

        let (log, author) = {
            let c = changesets.get(group);
            (c.log, c.author)
        };

        contains.clear();
        let mut frag = changesets.fresh(log, author);
        let mut last = model.rev(revs[0]).date.seconds();
        for &fr in &revs {
            let now = model.rev(fr).date.seconds();
            let mut cut = false;
            if now.wrapping_sub(last) > threshold {
                cut = true;
            } else if contains.contains(&model.rev(fr).file) {
                let pred = model.rev(fr).pred;
                if pred.is_some_and(|p| model.rev(p).changeset == Some(frag)) {
                    // Fixup: collapse the in-fragment predecessor.
                    let grandparent = model.rev(pred.expect("checked")).pred;
                    model.rev_mut(fr).pred = grandparent;
                    info!(
                        "treating {} {} as fixup commit",
                        model.file_path_lossy(model.rev(fr).file),
                        revnums.format(model.rev(fr).rev),
                    );
                } else {
                    cut = true;
                }
            } else {
                contains.insert(model.rev(fr).file);
            }
            if cut {
                contains.clear();
                split.push(frag);
                frag = changesets.fresh(log, author);
                contains.insert(model.rev(fr).file);
            }
            last = now;
            changesets.add_rev(frag, fr, model);
        }
        split.push(frag);
    }

    split
}

/// First pass: does this group need to be rebuilt at all?
fn needs_split(
    model: &Model,
    revs: &[FileRevId],
    threshold: u64,
    contains: &mut AHashSet<crate::model::FileId>,
) -> bool {
    contains.clear();
    let mut last = model.rev(revs[0]).date.seconds();
    for &fr in revs {
        let now = model.rev(fr).date.seconds();
        if now.wrapping_sub(last) > threshold {
            return true;
        }
        let file = model.rev(fr).file;
        if contains.contains(&file) {
            // Both the fixup and the true-duplicate case force a rebuild.
            return true;
        }
        contains.insert(file);
        last = now;
    }
    false
}
