//! Script text handling: batch splitting, error locations and stored
//! procedure names.

mod locator;
mod splitter;
mod sproc;

pub use locator::{locate, locate_reported, Location};
pub use splitter::{split, BatchSplitter, Batches, DEFAULT_SEPARATOR};
pub use sproc::parse_sproc_name;
