//! BGZF (Blocked GNU Zip Format) block reader.
//!
//! BAM files are stored as a series of concatenated gzip members, each at
//! most 64 KiB uncompressed. Every member carries a `BC` extra subfield
//! declaring its compressed size, which makes it possible to seek straight to
//! the start of any block. Paired with a BAI index, this gives random access
//! into the compressed stream.
//!
//! The reader here decodes exactly one member per call. It parses the gzip
//! framing itself and reads precisely the declared number of compressed
//! bytes, so the decompressor can never run past a member boundary and the
//! file position is always explicit.

use crate::error::{BamScopeError, Result};
use flate2::read::DeflateDecoder;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// The 28-byte BGZF end-of-file sentinel: an empty deflate stream in full
/// gzip framing, required at the tail of every intact BGZF file.
pub const BGZF_EOF: [u8; 28] = [
    0x1f, 0x8b, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x06, 0x00, 0x42, 0x43, 0x02,
    0x00, 0x1b, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// A virtual offset within a BGZF-compressed file.
///
/// Packs the compressed file offset of a block start (upper 48 bits) with a
/// byte offset inside that block's uncompressed payload (lower 16 bits).
/// Natural `u64` ordering is equivalent to lexicographic ordering on the
/// `(compressed, uncompressed)` pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualOffset(u64);

impl VirtualOffset {
    /// Create a virtual offset from its raw 64-bit representation.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Create a virtual offset from a compressed block start and an offset
    /// within the uncompressed block.
    pub fn from_parts(compressed: i64, uncompressed: u16) -> Self {
        Self(((compressed as u64) << 16) | uncompressed as u64)
    }

    /// The raw 64-bit representation.
    pub fn raw(self) -> u64 {
        self.0
    }

    /// The offset of the compressed block start in the file.
    pub fn compressed(self) -> i64 {
        (self.0 >> 16) as i64
    }

    /// The offset within the uncompressed block.
    pub fn uncompressed(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }
}

/// Random-access reader over the BGZF members of one file.
///
/// Opening validates the EOF sentinel; afterwards [`read_block_at`] seeks to
/// any block start and returns that member's uncompressed payload together
/// with the compressed member length (the distance to the next block start).
///
/// [`read_block_at`]: BgzfReader::read_block_at
#[derive(Debug)]
pub struct BgzfReader {
    file: File,
    len: u64,
}

impl BgzfReader {
    /// Open a BGZF file and validate the EOF sentinel at its tail.
    ///
    /// # Errors
    ///
    /// Returns [`BamScopeError::Truncated`] when the file is shorter than the
    /// sentinel or its last 28 bytes do not match it, and I/O errors from
    /// opening or reading the file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let len = file.seek(SeekFrom::End(0))?;
        if len < BGZF_EOF.len() as u64 {
            return Err(BamScopeError::Truncated);
        }
        file.seek(SeekFrom::End(-(BGZF_EOF.len() as i64)))?;
        let mut tail = [0u8; BGZF_EOF.len()];
        file.read_exact(&mut tail)?;
        if tail != BGZF_EOF {
            return Err(BamScopeError::Truncated);
        }
        file.seek(SeekFrom::Start(0))?;
        Ok(Self { file, len })
    }

    /// Total length of the compressed file in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the file holds nothing beyond the EOF sentinel.
    pub fn is_empty(&self) -> bool {
        self.len <= BGZF_EOF.len() as u64
    }

    /// Decompress the single BGZF member starting at `offset`.
    ///
    /// Returns the uncompressed payload (empty for the EOF sentinel block)
    /// and the compressed member length in bytes. The next block starts at
    /// `offset + length`.
    pub fn read_block_at(&mut self, offset: i64) -> Result<(Vec<u8>, u32)> {
        self.file.seek(SeekFrom::Start(offset as u64))?;
        read_member(&mut self.file, offset)
    }
}

/// Parse and decompress one gzip member with a BGZF `BC` subfield.
fn read_member<R: Read>(reader: &mut R, offset: i64) -> Result<(Vec<u8>, u32)> {
    // Fixed gzip header: magic, method, flags, mtime, xfl, os, xlen.
    let mut header = [0u8; 12];
    reader.read_exact(&mut header)?;
    if header[0] != 0x1f || header[1] != 0x8b || header[2] != 0x08 {
        return Err(invalid(offset, "not a gzip member"));
    }
    if header[3] & 0x04 == 0 {
        return Err(invalid(offset, "gzip member has no extra field"));
    }
    let xlen = u16::from_le_bytes([header[10], header[11]]) as usize;
    let mut extra = vec![0u8; xlen];
    reader.read_exact(&mut extra)?;

    let bsize = find_bsize(&extra)
        .ok_or_else(|| invalid(offset, "extra field has no 2-byte BC subfield"))?;
    let block_size = bsize as u32 + 1;

    // Everything after the header and extra field, minus the CRC32 + ISIZE
    // trailer, is the deflate payload.
    let framing = 12 + xlen + 8;
    let data_size = (block_size as usize)
        .checked_sub(framing)
        .ok_or_else(|| invalid(offset, "declared block size smaller than gzip framing"))?;
    let mut cdata = vec![0u8; data_size];
    reader.read_exact(&mut cdata)?;

    let mut trailer = [0u8; 8];
    reader.read_exact(&mut trailer)?;
    let isize = u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]) as usize;

    let mut payload = vec![0u8; isize];
    if isize > 0 {
        let mut decoder = DeflateDecoder::new(&cdata[..]);
        decoder
            .read_exact(&mut payload)
            .map_err(|e| invalid(offset, format!("decompression failed: {e}")))?;
    }
    Ok((payload, block_size))
}

/// Scan a gzip extra field for the `BC` subfield carrying `block_size - 1`.
fn find_bsize(extra: &[u8]) -> Option<u16> {
    let mut pos = 0;
    while pos + 4 <= extra.len() {
        let slen = u16::from_le_bytes([extra[pos + 2], extra[pos + 3]]) as usize;
        if extra[pos] == b'B' && extra[pos + 1] == b'C' && slen == 2 && pos + 6 <= extra.len() {
            return Some(u16::from_le_bytes([extra[pos + 4], extra[pos + 5]]));
        }
        pos += 4 + slen;
    }
    None
}

fn invalid(offset: i64, msg: impl Into<String>) -> BamScopeError {
    BamScopeError::InvalidBgzf {
        offset,
        msg: msg.into(),
    }
}
