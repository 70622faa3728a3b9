//! # MV-RLU Skip List
//!
//! A concurrent ordered set of `i64` keys whose nodes are MV-RLU versioned
//! objects. Searches never block and observe one snapshot of the whole
//! structure; inserts and removals change every level of a node at one
//! commit clock.
//!
//! ## Quick Start
//!
//! ```rust
//! use mvrlu_skiplist::SkipList;
//!
//! fn main() -> Result<(), mvrlu::MvrluError> {
//!     let list = SkipList::with_defaults()?;
//!     let mut thread = list.register()?;
//!
//!     for key in [30, 10, 20] {
//!         list.insert(&mut thread, key)?;
//!     }
//!     assert_eq!(list.keys(&thread), vec![10, 20, 30]);
//!     assert_eq!(list.range(&thread, 15, 30), vec![20]);
//!     Ok(())
//! }
//! ```
//!
//! ## Layout
//!
//! ```text
//!  L2  head ──────────────► 42 ─────────────────► tail
//!  L1  head ──────► 17 ───► 42 ─────────────────► tail
//!  L0  head ► 3 ──► 17 ───► 42 ──► 58 ──► 91 ───► tail
//! ```
//!
//! The head and tail sentinels carry `i64::MIN` and `i64::MAX` and span
//! all `MAX_HEIGHT` levels.
//!
//! ## Modules
//!
//! - [`skip_list`]: the list and its operations
//! - [`node`]: node payloads and serializable node views
//! - [`workload`]: uniform and Zipfian key distributions, timed mixes
//! - [`report`]: throughput table records

pub mod node;
pub mod report;
pub mod skip_list;
pub mod workload;

pub use node::{Node, NodeView, HEAD_KEY, MAX_HEIGHT, TAIL_KEY};
pub use report::{ThroughputRow, ThroughputTable};
pub use skip_list::SkipList;
pub use workload::{run_mix, KeyDistribution, Mix, Uniform, Zipf};
