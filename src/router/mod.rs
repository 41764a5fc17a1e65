// Router module
// Parallel route fan-out and result merging

mod merger;
mod parallel;
mod types;

pub use merger::{merge, merge_value, parse_results, Merger, NameMerger};
pub use parallel::{ParallelRouter, Route};
pub use types::{Body, MergeInput, MergedOutput, RouteResult};
