//! Property-based soundness tests.
//!
//! Run with: `cargo test --test property`

mod intern_identity;
mod logmsg_normalize;
mod piece_table_roundtrip;
mod revnum_roundtrip;
