//! Polling change detection.
//!
//! `ChangeDetector` reads the table set on a fixed interval, diffs it
//! against the previous snapshot and publishes a `ChangeSet` whenever
//! tables, seats or chip counts moved.

pub mod diff;
pub mod poller;

pub use diff::{diff_snapshots, ChangeSet, ChipChange, PlayerRef, TableRef};
pub use poller::{ChangeDetector, PollOutcome};
