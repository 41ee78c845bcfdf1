//! Topological ordering of changesets.
//!
//! Every file revision depends on its predecessor; a changeset therefore
//! depends on every changeset holding a predecessor of one of its
//! revisions. Scheduling counts, per changeset, how many *successor*
//! changesets still wait on it, keeps a priority queue of the ready ones
//! (count zero), and pops the oldest first. Popping assigns dense ids in
//! pop order, so id 0 is the newest commit and emission simply walks the
//! result backwards.
//!
//! Predecessors inside the same changeset (absorbed fixups) contribute no
//! dependency. A nonzero count left after the queue drains means the
//! dependency graph had a cycle, which no well-formed archive set can
//! produce; it is reported as a fatal error.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;

use crate::date::Date;
use crate::model::{ChangesetPool, Model, SetId};

/// Fatal error: the changeset dependency graph contains a cycle.
#[derive(Debug)]
pub struct CycleError {
    /// Changesets left unscheduled when the queue drained.
    pub stuck: usize,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "internal error: changeset graph has a cycle ({} changesets unscheduled)",
            self.stuck
        )
    }
}

impl std::error::Error for CycleError {}

/// Heap entry; the max-heap pops the newest ready changeset first, so the
/// reversed result comes out oldest-first.
struct Ready {
    oldest: Date,
    rank: u32,
    set: SetId,
}

impl PartialEq for Ready {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ready {}

impl PartialOrd for Ready {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ready {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.oldest, self.rank).cmp(&(other.oldest, other.rank))
    }
}

/// Schedules the split changesets; the result is in pop order (newest
/// commit first), with `id` recording each changeset's position.
pub fn order(
    model: &Model,
    changesets: &mut ChangesetPool,
    ranks: &[u32],
    split: &[SetId],
) -> Result<Vec<SetId>, CycleError> {
    for &set in split {
        changesets.get_mut(set).n_succ = 0;
    }
    for &set in split {
        for i in 0..changesets.get(set).filerevs.len() {
            let fr = changesets.get(set).filerevs[i];
            let Some(pred) = model.rev(fr).pred else {
                continue;
            };
            let Some(pc) = model.rev(pred).changeset else {
                continue;
            };
            if pc != set {
                changesets.get_mut(pc).n_succ += 1;
            }
        }
    }

    let mut queue: BinaryHeap<Ready> = BinaryHeap::new();
    for &set in split {
        if changesets.get(set).n_succ == 0 {
            queue.push(ready(model, changesets, ranks, set));
        }
    }

    let mut sorted: Vec<SetId> = Vec::with_capacity(split.len());
    while let Some(Ready { set, .. }) = queue.pop() {
        changesets.get_mut(set).id = sorted.len() as u32;
        sorted.push(set);

        for i in 0..changesets.get(set).filerevs.len() {
            let fr = changesets.get(set).filerevs[i];
            let Some(pred) = model.rev(fr).pred else {
                continue;
            };
            let Some(pc) = model.rev(pred).changeset else {
                continue;
            };
            if pc == set {
                continue;
            }
            changesets.get_mut(pc).n_succ -= 1;
            if changesets.get(pc).n_succ == 0 {
                queue.push(ready(model, changesets, ranks, pc));
            }
        }
    }

    if sorted.len() != split.len() {
        return Err(CycleError {
            stuck: split.len() - sorted.len(),
        });
    }
    debug_assert!(is_ordered(model, changesets, &sorted));
    Ok(sorted)
}

fn ready(model: &Model, changesets: &ChangesetPool, ranks: &[u32], set: SetId) -> Ready {
    let c = changesets.get(set);
    Ready {
        oldest: c.oldest,
        rank: ranks[model.rev(c.filerevs[0]).file.0 as usize],
        set,
    }
}

/// Every predecessor's changeset must carry a strictly larger dense id
/// (it is emitted earlier).
fn is_ordered(model: &Model, changesets: &ChangesetPool, sorted: &[SetId]) -> bool {
    sorted.iter().all(|&set| {
        changesets.get(set).filerevs.iter().all(|&fr| {
            match model.rev(fr).pred.and_then(|p| model.rev(p).changeset) {
                Some(pc) if pc != set => changesets.get(pc).id > changesets.get(set).id,
                _ => true,
            }
        })
    })
}

/// Convenience for callers that want emission order directly.
pub fn emission_order(sorted: &[SetId]) -> impl Iterator<Item = SetId> + '_ {
    sorted.iter().rev().copied()
}
