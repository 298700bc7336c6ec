//! Iteration runner module.
//!
//! - `IterationRunner` runs one fresh work-unit session per iteration
//! - `parse` extracts completion, changed resources and test/lint summaries
//! - `fingerprint` hashes failure messages for repeated-error detection

pub mod fingerprint;
mod iteration;
pub mod parse;

pub use fingerprint::fingerprint;
pub use iteration::IterationRunner;
