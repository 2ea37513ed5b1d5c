//! I/O layer: BGZF block decoding and the decompressed-block caches.

pub mod bam;
pub mod bgzf;
pub mod cache;

pub use bgzf::{BgzfReader, VirtualOffset, BGZF_EOF};
pub use cache::BlockCache;
