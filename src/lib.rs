//! Convert RCS/CVS repositories into modern version-control streams.
//!
//! The converter reads a tree of RCS `*,v` archives (the per-file storage
//! CVS uses, with `Attic/` holding files deleted at head) and produces one
//! totally ordered sequence of commits, emitted as either a git
//! fast-import stream or an svn filesystem dump.
//!
//! Pipeline:
//! 1. [`walk`] feeds each archive to the [`convert::Converter`].
//! 2. [`rcs`] parses the archive into interned revision records; [`lexer`]
//!    and [`intern`] keep every byte string unique so later comparisons
//!    are handle equality.
//! 3. [`piece_table`] rebuilds each trunk revision's full text by applying
//!    reverse deltas from the head; [`keyword`] folds expanded RCS
//!    keywords back to their bare form on the way in.
//! 4. [`cluster`] groups revisions by `(log, author)` and splits groups on
//!    time gaps and duplicate files.
//! 5. [`schedule`] orders changesets so every revision follows its
//!    predecessor, oldest first.
//! 6. [`tags`] reconciles symbolic names, and [`emit`] renders the stream.
//!
//! Everything is single-threaded; pools and arenas live for one
//! [`convert::Converter`] run.

pub mod cluster;
pub mod convert;
pub mod date;
pub mod emit;
pub mod intern;
pub mod keyword;
pub mod lexer;
pub mod logmsg;
pub mod model;
pub mod options;
pub mod piece_table;
pub mod rcs;
pub mod revnum;
pub mod schedule;
pub mod tags;
pub mod walk;

pub use convert::{Converter, Error, Stats};
pub use emit::Sink;
pub use options::{Options, OutputFormat};
