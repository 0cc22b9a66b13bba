//! Word frequency counting with an order-independent merge.
//!
//! [`counts`] holds the `WordCounts` table and its `<count>\t<word>` line
//! format; [`workers`] spreads input files over threads or child processes
//! and merges what comes back.

pub mod counts;
pub mod workers;

pub use counts::{CountsError, Entry, WordCounts, by_count, count_file};
pub use workers::{Mode, count_paths};
