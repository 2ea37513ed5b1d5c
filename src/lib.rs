//! bamscope: random-access reader for BAM alignment files and BAI indexes
//!
//! # Overview
//!
//! bamscope loads a BAM file together with its companion `.bai` index and
//! serves region-restricted alignment pileups: the read sequences overlapping
//! a half-open genomic interval, formatted as space-padded rows for textual
//! consumption.
//!
//! Three concerns carry the implementation:
//!
//! - **BGZF random access** ([`io::bgzf`]): decompressing one gzip member at
//!   a file offset and resuming record parsing across block boundaries,
//!   driven by 64-bit virtual offsets.
//! - **BAI interpretation** ([`formats::index`]): UCSC hierarchical binning
//!   plus a linear index of 16 Kbp windows, mapping intervals to chunks of
//!   the compressed file.
//! - **Bounded block caching** ([`io::cache`]): small files are held
//!   entirely in memory; larger ones go through a four-queue segmented LRU
//!   sized by a configurable memory budget.
//!
//! # Quick Start
//!
//! ```no_run
//! use bamscope::AlignmentMap;
//!
//! # fn main() -> bamscope::Result<()> {
//! let mut map = AlignmentMap::load("alignments.bam")?;
//!
//! for reference in &map.references {
//!     println!("{}: {} bp", reference.name, reference.length);
//! }
//!
//! for row in map.get_map(0, 95, 115)? {
//!     println!("{row}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`io`]: BGZF block reader, block caches, and BAM record decoding
//! - [`formats`]: the BAI index format and its bin arithmetic
//! - [`config`]: per-file memory budget
//! - [`progress`]: synchronous progress callbacks

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod formats;
pub mod io;
pub mod progress;

// Re-export commonly used types
pub use config::{parse_memory_size, LoadConfig, DEFAULT_MAX_MEMORY};
pub use error::{BamScopeError, Result};
pub use formats::index::{reg2bin, reg2bins, BaiIndex, Bin, Chunk, IndexReference};
pub use io::bam::{unpack_sequence, Alignment, AlignmentMap, AuxValue, Header, Reference};
pub use io::bgzf::VirtualOffset;
pub use progress::{null_progress, stderr_progress, ProgressFn};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
