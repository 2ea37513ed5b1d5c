//! Index formats enabling random access into compressed alignment files.
//!
//! Currently this is the BAI index: hierarchical bins plus a linear index,
//! resolving genomic intervals to chunks of BGZF virtual offsets.

pub mod bai;

pub use bai::{reg2bin, reg2bins, BaiIndex, Bin, Chunk, IndexReference};
