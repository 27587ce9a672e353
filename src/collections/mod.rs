//! Containers backing the runtime's maps, environments, ranges, and iterators.

pub mod iter;
pub mod range;
pub mod table;

pub use iter::{IterState, Yield};
pub use range::Range;
pub use table::{HashTable, TableCursor};
