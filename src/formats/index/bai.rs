//! BAI (BAM index) format support.
//!
//! A `.bam.bai` file maps genomic intervals on each reference sequence to the
//! compressed-file regions holding the overlapping alignments. It combines
//! two structures per reference:
//!
//! - a hierarchical binning index on the UCSC scheme: 37,450 bins over
//!   512 Mbp, in five levels from one 512 Mbp bin down to 32,768 bins of
//!   16 Kbp each, where every bin holds chunks of virtual file offsets;
//! - a linear index of 16 Kbp windows, each entry the smallest virtual
//!   offset of any record overlapping that window.
//!
//! The reserved pseudo-bin 37450 does not describe an interval: its two
//! chunks carry the file region of unmapped placed reads and the
//! mapped/unmapped read counters for the reference.
//!
//! # File format (little-endian)
//!
//! ```text
//! magic     char[4]   "BAI\x01"
//! n_ref     int32
//! per reference:
//!   n_bin   int32
//!   per bin:
//!     bin      uint32
//!     n_chunk  int32
//!     chunks   (uint64, uint64)[n_chunk]
//!   n_intv  int32
//!   ioffs   uint64[n_intv]
//! ```

use crate::error::{BamScopeError, Result};
use crate::io::bgzf::VirtualOffset;
use crate::progress::{null_progress, ProgressFn};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// BAI file magic.
const BAI_MAGIC: &[u8; 4] = b"BAI\x01";

/// The reserved bin carrying unmapped-read metadata.
pub const PSEUDO_BIN: u32 = 37450;

/// A section of alignments within one bin: a `[begin, end)` range of virtual
/// offsets into the compressed BAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Virtual offset of the first record in the chunk.
    pub begin: VirtualOffset,
    /// Virtual offset just past the last record in the chunk.
    pub end: VirtualOffset,
}

/// The chunks grouped under one bin.
pub type Bin = Vec<Chunk>;

/// Index data for one reference sequence.
#[derive(Debug, Clone, Default)]
pub struct IndexReference {
    /// Bins grouping aligned sequences into a tree structure.
    pub bins: HashMap<u32, Bin>,
    /// Linear index: smallest virtual offset per 16 Kbp window.
    pub intervals: Vec<VirtualOffset>,
    /// File region of unmapped reads placed on this reference, if recorded.
    pub unmapped: Option<Chunk>,
    /// Mapped read-segment count for this reference.
    pub total_mapped: u64,
    /// Unmapped read-segment count for this reference.
    pub total_unmapped: u64,
}

/// A loaded BAM index: one [`IndexReference`] per reference sequence, in the
/// same order as the companion BAM's reference table.
#[derive(Debug, Clone)]
pub struct BaiIndex {
    /// Per-reference index data.
    pub refs: Vec<IndexReference>,
}

impl BaiIndex {
    /// Load a BAI index from a file.
    ///
    /// Usually unnecessary: [`AlignmentMap::load`] picks up `file.bam.bai`
    /// automatically when it exists.
    ///
    /// [`AlignmentMap::load`]: crate::AlignmentMap::load
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load(path, &null_progress())
    }

    pub(crate) fn load<P: AsRef<Path>>(path: P, progress: &ProgressFn) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::parse(&mut reader, progress)
    }

    /// Parse a BAI index from a reader, reporting per-reference progress.
    fn parse<R: Read>(reader: &mut R, progress: &ProgressFn) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != BAI_MAGIC {
            return Err(BamScopeError::InvalidIndex(format!(
                "magic {magic:?} is not BAI\\x01"
            )));
        }

        let num_refs = read_i32(reader)?;
        if num_refs < 0 {
            return Err(BamScopeError::InvalidIndex(format!(
                "negative reference count {num_refs}"
            )));
        }

        let mut refs = Vec::with_capacity(num_refs as usize);
        for i in 0..num_refs {
            progress((i * 100) as f64 / num_refs as f64);
            let mut iref = IndexReference::default();

            let num_bins = read_i32(reader)?;
            for _ in 0..num_bins {
                let bin_id = read_u32(reader)?;
                let num_chunks = read_i32(reader)?;
                let mut chunks = Vec::with_capacity(num_chunks.max(0) as usize);
                for _ in 0..num_chunks {
                    let begin = VirtualOffset::new(read_u64(reader)?);
                    let end = VirtualOffset::new(read_u64(reader)?);
                    chunks.push(Chunk { begin, end });
                }
                if bin_id == PSEUDO_BIN {
                    // Unmapped reads are held/recorded separately.
                    if chunks.len() != 2 {
                        return Err(BamScopeError::InvalidIndex(format!(
                            "pseudo-bin 37450 carries {} chunks, expected 2",
                            chunks.len()
                        )));
                    }
                    iref.unmapped = Some(chunks[0]);
                    iref.total_mapped = chunks[1].begin.raw();
                    iref.total_unmapped = chunks[1].end.raw();
                    continue;
                }
                iref.bins.insert(bin_id, chunks);
            }

            let num_intervals = read_i32(reader)?;
            iref.intervals.reserve(num_intervals.max(0) as usize);
            for _ in 0..num_intervals {
                iref.intervals.push(VirtualOffset::new(read_u64(reader)?));
            }
            refs.push(iref);
        }
        progress(-1.0);
        Ok(BaiIndex { refs })
    }
}

/// Compute the narrowest single bin fully containing `[begin, end)`.
///
/// Starting from the 16 Kbp leaf level, returns the first level at which both
/// interval ends fall into the same bin. Requires `begin < end <= 2^29`.
pub fn reg2bin(begin: u64, end: u64) -> u32 {
    let end = (end - 1) >> 14;
    let begin = begin >> 14;

    if begin == end {
        return 4681 + begin as u32;
    }
    if begin >> 3 == end >> 3 {
        return 585 + (begin >> 3) as u32;
    }
    if begin >> 6 == end >> 6 {
        return 73 + (begin >> 6) as u32;
    }
    if begin >> 9 == end >> 9 {
        return 9 + (begin >> 9) as u32;
    }
    if begin >> 12 == end >> 12 {
        return 1 + (begin >> 12) as u32;
    }
    0
}

/// Compute every bin that intersects `[begin, end)`, across all levels.
///
/// The result always starts with the root bin 0 and includes, per level, the
/// contiguous run of bins touched by the interval. Requires
/// `begin < end <= 2^29`.
pub fn reg2bins(begin: u64, end: u64) -> Vec<u32> {
    let end = (end - 1) >> 14;
    let begin = begin >> 14;

    let mut bins = Vec::with_capacity(((1usize << 18) - 1) / 7);
    bins.push(0);
    for (shift, base) in [(12u64, 1u64), (9, 9), (6, 73), (3, 585), (0, 4681)] {
        for k in (base + (begin >> shift))..=(base + (end >> shift)) {
            bins.push(k as u32);
        }
    }
    bins
}

fn read_i32<R: Read>(reader: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    /// Serialize a minimal index: one reference with the given bins,
    /// intervals, and optional pseudo-bin payload.
    fn index_bytes(
        bins: &[(u32, Vec<(u64, u64)>)],
        intervals: &[u64],
        pseudo: Option<((u64, u64), u64, u64)>,
    ) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"BAI\x01");
        data.extend_from_slice(&1i32.to_le_bytes());

        let total_bins = bins.len() as i32 + pseudo.is_some() as i32;
        data.extend_from_slice(&total_bins.to_le_bytes());
        for (bin_id, chunks) in bins {
            data.extend_from_slice(&bin_id.to_le_bytes());
            data.extend_from_slice(&(chunks.len() as i32).to_le_bytes());
            for (begin, end) in chunks {
                data.extend_from_slice(&begin.to_le_bytes());
                data.extend_from_slice(&end.to_le_bytes());
            }
        }
        if let Some(((ub, ue), mapped, unmapped)) = pseudo {
            data.extend_from_slice(&PSEUDO_BIN.to_le_bytes());
            data.extend_from_slice(&2i32.to_le_bytes());
            data.extend_from_slice(&ub.to_le_bytes());
            data.extend_from_slice(&ue.to_le_bytes());
            data.extend_from_slice(&mapped.to_le_bytes());
            data.extend_from_slice(&unmapped.to_le_bytes());
        }

        data.extend_from_slice(&(intervals.len() as i32).to_le_bytes());
        for ioff in intervals {
            data.extend_from_slice(&ioff.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_parse_bins_and_intervals() {
        let data = index_bytes(
            &[(4681, vec![(100 << 16, 200 << 16)])],
            &[100 << 16, 150 << 16],
            None,
        );
        let index = BaiIndex::parse(&mut Cursor::new(data), &null_progress()).unwrap();
        assert_eq!(index.refs.len(), 1);
        let iref = &index.refs[0];
        assert_eq!(iref.bins.len(), 1);
        let chunks = &iref.bins[&4681];
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].begin.compressed(), 100);
        assert_eq!(chunks[0].end.compressed(), 200);
        assert_eq!(iref.intervals.len(), 2);
        assert_eq!(iref.intervals[1].compressed(), 150);
    }

    #[test]
    fn test_parse_pseudo_bin_counters() {
        let data = index_bytes(&[], &[], Some(((1 << 16, 2 << 16), 12345, 678)));
        let index = BaiIndex::parse(&mut Cursor::new(data), &null_progress()).unwrap();
        let iref = &index.refs[0];
        assert!(iref.bins.is_empty());
        let unmapped = iref.unmapped.expect("pseudo-bin chunk");
        assert_eq!(unmapped.begin.compressed(), 1);
        assert_eq!(unmapped.end.compressed(), 2);
        assert_eq!(iref.total_mapped, 12345);
        assert_eq!(iref.total_unmapped, 678);
    }

    #[test]
    fn test_parse_rejects_bad_magic() {
        // In particular, BAM magic is not BAI magic.
        let mut data = index_bytes(&[], &[], None);
        data[..4].copy_from_slice(b"BAM\x01");
        let err = BaiIndex::parse(&mut Cursor::new(data), &null_progress()).unwrap_err();
        assert!(matches!(err, BamScopeError::InvalidIndex(_)));
    }

    #[test]
    fn test_parse_rejects_malformed_pseudo_bin() {
        let mut data = Vec::new();
        data.extend_from_slice(b"BAI\x01");
        data.extend_from_slice(&1i32.to_le_bytes());
        data.extend_from_slice(&1i32.to_le_bytes()); // one bin
        data.extend_from_slice(&PSEUDO_BIN.to_le_bytes());
        data.extend_from_slice(&1i32.to_le_bytes()); // only one chunk
        data.extend_from_slice(&[0u8; 16]);
        data.extend_from_slice(&0i32.to_le_bytes());
        assert!(BaiIndex::parse(&mut Cursor::new(data), &null_progress()).is_err());
    }

    #[test]
    fn test_reg2bin_levels() {
        assert_eq!(reg2bin(0, 1), 4681);
        assert_eq!(reg2bin(0, 16384), 4681);
        assert_eq!(reg2bin(0, 16385), 585);
        assert_eq!(reg2bin(0, 1 << 29), 0);
        // Second leaf window
        assert_eq!(reg2bin(16384, 16385), 4682);
    }

    #[test]
    fn test_reg2bins_single_position() {
        let mut bins = reg2bins(0, 1);
        bins.sort_unstable();
        assert_eq!(bins, vec![0, 1, 9, 73, 585, 4681]);
    }

    #[test]
    fn test_reg2bins_is_one_chain_per_level_for_single_positions() {
        for begin in [0u64, 16384, 1 << 20, (1 << 29) - 1] {
            let bins = reg2bins(begin, begin + 1);
            // Root plus one bin per lower level.
            assert_eq!(bins.len(), 6, "position {begin}");
        }
    }

    #[test]
    fn test_reg2bins_spanning_interval() {
        // Crossing a 16 Kbp boundary touches two leaf bins.
        let bins = reg2bins(16000, 17000);
        assert!(bins.contains(&4681));
        assert!(bins.contains(&4682));
        assert!(bins.contains(&585));
        assert!(bins.contains(&0));
    }

    proptest! {
        #[test]
        fn prop_reg2bin_is_member_of_reg2bins(
            begin in 0u64..(1 << 29),
            span in 1u64..20000,
        ) {
            let end = (begin + span).min(1 << 29);
            prop_assume!(begin < end);
            let bin = reg2bin(begin, end);
            prop_assert!(reg2bins(begin, end).contains(&bin));
        }
    }
}
