//! Structural Grain Comparison
//!
//! Comparing two grains (or two grain sequences) yields a [`DiffNode`]
//! tree isomorphic to the grain's attribute tree. Every node carries a
//! verdict and renders to one line, so a failed assertion prints exactly
//! which attribute diverged and how:
//!
//! ```text
//! ✅   grain
//!   ✅   grain_type == video
//!   ✅   source_id == 00112233-4455-6677-8899-aabbccddeeff
//!   ❌   origin_timestamp: a - b == 40000000ns, expected 0
//!   ◯   creation_timestamp ignored
//!   ...
//! ```
//!
//! ## Options
//!
//! The walk is refined by [`CompareOptions`]:
//!
//! - `include(path)` / `exclude(path)`: excluded paths are rendered for
//!   diagnostics but do not affect the verdict. Exclude beats include on
//!   the same path. `creation_timestamp` is excluded unless included.
//! - `expected_difference(path, op, value)`: for timestamps and numeric
//!   scalars the comparator evaluates `a - b OP value` instead of
//!   requiring equality.
//! - `psnr(path, op, thresholds)`: replaces byte equality of the data
//!   region with a per-component PSNR measurement compared against the
//!   threshold list.
//! - `compare_only_metadata()`: shorthand for excluding the data region.
//!
//! Content differences never raise errors; they become `Different` nodes.
//! Structurally impossible comparisons (a video grain against an audio
//! grain) fail with the cause carried as the root node's reason.

pub mod compare;
pub mod diff;
pub mod options;
pub mod psnr;

pub use compare::{compare_grain, compare_sequences, SequenceDiff};
pub use diff::DiffNode;
pub use options::{CompareOptions, Op};
pub use psnr::compute_planar_psnr;

pub use gsf_core::{Error, Result};
