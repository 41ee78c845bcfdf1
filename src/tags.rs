//! Tag reconciliation.
//!
//! Symbols collected during parsing reference revisions that may not
//! exist, may be dead, or may have been split across several changesets.
//! Resolution filters each tag's member list down to live revisions,
//! remembers the most recent changeset any member (dead ones included)
//! belongs to, and drops tags with nothing left to point at.
//!
//! The surviving tags are returned in emission order: a tag is emitted
//! right after its most recent changeset, so tags whose anchor commit is
//! older come first.

use tracing::warn;

use crate::intern::StringPool;
use crate::model::{ChangesetPool, Model, RevState, SetId, TagId, TagPool};
use crate::revnum::RevPool;

/// Filters tag members and computes emission order.
///
/// Must run after scheduling, since it orders by dense changeset ids.
pub fn resolve_tags(
    model: &Model,
    changesets: &ChangesetPool,
    tags: &mut TagPool,
    pool: &StringPool,
    revnums: &RevPool,
) -> Vec<TagId> {
    let mut sorted: Vec<TagId> = Vec::new();

    for idx in 0..tags.len() as u32 {
        let id = TagId(idx);
        let mut latest: Option<SetId> = None;
        let mut members = std::mem::take(&mut tags.get_mut(id).filerevs);

        let mut i = 0;
        while i < members.len() {
            let fr = members[i];
            let rev = model.rev(fr);
            match rev.changeset {
                None => {
                    warn!(
                        "tagged revision {} of {} in tag {} does not exist",
                        revnums.format(rev.rev),
                        model.file_path_lossy(rev.file),
                        pool.lossy(tags.get(id).name),
                    );
                    members.swap_remove(i);
                }
                Some(set) => {
                    if latest.map_or(true, |l| changesets.get(l).id > changesets.get(set).id) {
                        latest = Some(set);
                    }
                    if rev.state == RevState::Dead {
                        // Dead members still anchor the tag in time but
                        // are not emitted.
                        members.swap_remove(i);
                    } else {
                        i += 1;
                    }
                }
            }
        }

        {
            let tag = tags.get_mut(id);
            tag.latest = latest;
            tag.filerevs = members;
        }
        if tags.get(id).filerevs.is_empty() {
            warn!("tag {} is empty", pool.lossy(tags.get(id).name));
        } else {
            sorted.push(id);
        }
    }

    // Oldest anchor first (dense ids shrink towards the newest commit);
    // ties break on the tag name for a stable stream.
    sorted.sort_by(|&a, &b| {
        let (ta, tb) = (tags.get(a), tags.get(b));
        let (ia, ib) = (
            changesets.get(ta.latest.expect("non-empty tag")).id,
            changesets.get(tb.latest.expect("non-empty tag")).id,
        );
        ib.cmp(&ia)
            .then_with(|| pool.bytes(ta.name).cmp(pool.bytes(tb.name)))
    });
    sorted
}

/// Orders tagged revisions for emission: members of older-emitted
/// changesets first (descending dense id).
pub fn sort_members(model: &Model, changesets: &ChangesetPool, members: &mut [crate::model::FileRevId]) {
    members.sort_by(|&a, &b| {
        let ia = changesets
            .get(model.rev(a).changeset.expect("resolved member"))
            .id;
        let ib = changesets
            .get(model.rev(b).changeset.expect("resolved member"))
            .id;
        ib.cmp(&ia)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::Date;
    use crate::model::FileId;
    use crate::revnum::RevPool;

    struct Fixture {
        pool: StringPool,
        revnums: RevPool,
        model: Model,
        sets: ChangesetPool,
        tags: TagPool,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                pool: StringPool::new(),
                revnums: RevPool::new(),
                model: Model::new(),
                sets: ChangesetPool::new(),
                tags: TagPool::new(),
            }
        }

        fn file(&mut self, name: &str) -> FileId {
            let root = self.model.root();
            self.model.add_file(root, name.as_bytes(), false)
        }

        /// A one-revision changeset with the given dense id.
        fn rev_in_set(
            &mut self,
            file: FileId,
            num: &str,
            dense_id: u32,
            state: RevState,
        ) -> crate::model::FileRevId {
            let log = self.pool.intern(b"log");
            let author = Some(self.pool.intern(b"dev"));
            let rid = self.revnums.parse(num.as_bytes()).unwrap();
            let fr = self.model.add_rev(file, rid);
            self.model.rev_mut(fr).date = Date::new(2020, 1, 1, 0, 0, 0);
            self.model.rev_mut(fr).state = state;
            let set = self.sets.fresh(log, author);
            self.sets.add_rev(set, fr, &mut self.model);
            self.sets.get_mut(set).id = dense_id;
            fr
        }

        fn resolve(&mut self) -> Vec<TagId> {
            resolve_tags(
                &self.model,
                &self.sets,
                &mut self.tags,
                &self.pool,
                &self.revnums,
            )
        }
    }

    #[test]
    fn live_members_survive_and_latest_is_newest() {
        let mut fx = Fixture::new();
        let fa = fx.file("a");
        let fb = fx.file("b");
        let ra = fx.rev_in_set(fa, "1.1", 5, RevState::Exp);
        let rb = fx.rev_in_set(fb, "1.1", 2, RevState::Exp);
        let name = fx.pool.intern(b"V1");
        fx.tags.add_rev(name, ra);
        fx.tags.add_rev(name, rb);

        let sorted = fx.resolve();
        assert_eq!(sorted.len(), 1);
        let tag = fx.tags.get(sorted[0]);
        assert_eq!(tag.filerevs.len(), 2);
        // Smallest dense id (most recent commit) anchors the tag.
        assert_eq!(tag.latest, fx.model.rev(rb).changeset);
    }

    #[test]
    fn dead_members_anchor_but_are_dropped() {
        let mut fx = Fixture::new();
        let fa = fx.file("a");
        let fb = fx.file("b");
        let live = fx.rev_in_set(fa, "1.1", 7, RevState::Exp);
        let dead = fx.rev_in_set(fb, "1.2", 1, RevState::Dead);
        let name = fx.pool.intern(b"V2");
        fx.tags.add_rev(name, live);
        fx.tags.add_rev(name, dead);

        let sorted = fx.resolve();
        assert_eq!(sorted.len(), 1);
        let tag = fx.tags.get(sorted[0]);
        assert_eq!(tag.filerevs, vec![live]);
        assert_eq!(tag.latest, fx.model.rev(dead).changeset);
    }

    #[test]
    fn unresolved_members_warn_and_drop() {
        let mut fx = Fixture::new();
        let fa = fx.file("a");
        let rid = fx.revnums.parse(b"1.9").unwrap();
        // A revision record that never saw a delta: no changeset.
        let phantom = fx.model.add_rev(fa, rid);
        let name = fx.pool.intern(b"GHOST");
        fx.tags.add_rev(name, phantom);

        let sorted = fx.resolve();
        assert!(sorted.is_empty());
        assert_eq!(fx.tags.get(TagId(0)).latest, None);
    }

    #[test]
    fn tags_order_by_anchor_age() {
        let mut fx = Fixture::new();
        let fa = fx.file("a");
        let fb = fx.file("b");
        let old = fx.rev_in_set(fa, "1.1", 9, RevState::Exp);
        let new = fx.rev_in_set(fb, "1.1", 0, RevState::Exp);
        let n_new = fx.pool.intern(b"NEW");
        let n_old = fx.pool.intern(b"OLD");
        fx.tags.add_rev(n_new, new);
        fx.tags.add_rev(n_old, old);

        let sorted = fx.resolve();
        let names: Vec<&[u8]> = sorted
            .iter()
            .map(|&t| fx.pool.bytes(fx.tags.get(t).name))
            .collect();
        assert_eq!(names, vec![&b"OLD"[..], b"NEW"]);
    }

    #[test]
    fn member_sort_is_descending_by_dense_id() {
        let mut fx = Fixture::new();
        let fa = fx.file("a");
        let fb = fx.file("b");
        let fc = fx.file("c");
        let r5 = fx.rev_in_set(fa, "1.1", 5, RevState::Exp);
        let r1 = fx.rev_in_set(fb, "1.1", 1, RevState::Exp);
        let r3 = fx.rev_in_set(fc, "1.1", 3, RevState::Exp);
        let mut members = vec![r1, r5, r3];
        sort_members(&fx.model, &fx.sets, &mut members);
        assert_eq!(members, vec![r5, r3, r1]);
    }
}
