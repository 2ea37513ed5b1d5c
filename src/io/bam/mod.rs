//! BAM (Binary Alignment Map) decoding.
//!
//! The pieces, bottom up:
//!
//! - [`sequence`]: 4-bit packed IUPAC sequence decoding
//! - [`tags`]: the auxiliary tag table and its tagged value union
//! - [`record`]: one alignment record decoded from a byte buffer
//! - [`header`]: SAM header text and the reference dictionary
//! - [`reader`]: [`AlignmentMap`], the random-access reader tying blocks,
//!   cache, index, and records together
//!
//! # Example
//!
//! ```no_run
//! use bamscope::AlignmentMap;
//!
//! # fn main() -> bamscope::Result<()> {
//! let mut map = AlignmentMap::load("alignments.bam")?;
//! println!("{} references", map.references.len());
//!
//! // Pileup rows over positions 1000..1080 of the first reference.
//! for row in map.get_map(0, 1000, 1080)? {
//!     println!("{row}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod header;
pub mod reader;
pub mod record;
pub mod sequence;
pub mod tags;

pub use header::{Header, Reference};
pub use reader::AlignmentMap;
pub use record::{parse_alignment, Alignment};
pub use sequence::unpack_sequence;
pub use tags::{AuxData, AuxValue};
