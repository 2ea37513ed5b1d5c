//! Random-access alignment map over a BAM file and its index.
//!
//! [`AlignmentMap::load`] bootstraps the reader: it validates the BGZF EOF
//! sentinel, streams blocks to decode the header and reference table, and
//! decides between two modes by comparing the file's block count against the
//! configured memory budget.
//!
//! - **Whole-file mode**: every decompressed block is retained in an
//!   unbounded cache and every record is decoded up front. The file handle
//!   is released; region queries are served from memory, with or without an
//!   index.
//! - **Partial mode**: only the header is decoded and the file handle is
//!   kept. Region queries require the index; blocks are fetched on demand
//!   and held in a bounded segmented LRU.
//!
//! A region query resolves the query interval to its leaf bin, walks that
//! bin's chunks through the cache, parses records across block boundaries,
//! filters them by overlap with the interval, and formats each survivor as a
//! space-padded row exactly `end - begin` characters wide.

use super::header::{parse_header, Reference};
use super::record::{drain_alignments, parse_alignment, Alignment};
use super::sequence::unpack_sequence;
use crate::config::{LoadConfig, BLOCK_SPAN};
use crate::error::{BamScopeError, Result};
use crate::formats::index::bai::{reg2bin, BaiIndex};
use crate::io::bgzf::BgzfReader;
use crate::io::cache::BlockCache;
use crate::progress::ProgressFn;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;

/// A sequence alignment/map: one loaded BAM file and, when present, its
/// companion BAI index.
///
/// Immutable after [`load`], except that region queries populate the block
/// cache and the block-advance table. Not safe for interleaved use from
/// multiple callers; serialize access.
///
/// [`load`]: AlignmentMap::load
pub struct AlignmentMap {
    /// SAM header text.
    pub header: String,
    /// Reference sequences, in file order.
    pub references: Vec<Reference>,
    /// Companion index, when `<file>.bai` exists.
    pub index: Option<BaiIndex>,

    partial: bool,
    reader: Option<BgzfReader>,
    blocks: BlockCache,
    /// How far to move forward in the compressed file to reach the next
    /// block start, keyed by block start. Grows monotonically as blocks are
    /// visited.
    block_advance: HashMap<i64, u32>,
    /// Every decoded record, in whole-file mode only.
    alignments: Vec<Alignment>,
    progress: ProgressFn,
}

impl std::fmt::Debug for AlignmentMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignmentMap")
            .field("header", &self.header)
            .field("references", &self.references)
            .field("index", &self.index)
            .field("partial", &self.partial)
            .field("alignments", &self.alignments)
            .finish_non_exhaustive()
    }
}

impl AlignmentMap {
    /// Load a BAM dataset from the file, with the default configuration.
    ///
    /// Looks for the companion index at `<path>.bai`; a missing index is not
    /// an error, only a logged warning.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with(path, LoadConfig::default())
    }

    /// Load a BAM dataset with an explicit memory budget and progress
    /// callback.
    pub fn load_with<P: AsRef<Path>>(path: P, config: LoadConfig) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BgzfReader::open(path)?;
        let size = reader.len();

        let max_cached = config.max_cached_blocks();
        let num_blocks = size / (BLOCK_SPAN - 1);
        let partial = num_blocks > max_cached;
        let blocks = if partial {
            BlockCache::segmented(max_cached as usize)
        } else {
            BlockCache::unbounded(num_blocks as usize)
        };

        let mut map = AlignmentMap {
            header: String::new(),
            references: Vec::new(),
            index: None,
            partial,
            reader: None,
            blocks,
            block_advance: HashMap::with_capacity(num_blocks as usize),
            alignments: Vec::new(),
            progress: config.progress,
        };

        let size_pct = size as f64 / 100.0;
        let mut remainder: Vec<u8> = Vec::new();
        let mut complete_header = false;
        let mut pos: i64 = 0;
        while (pos as u64) < size {
            let (data, advance) = reader.read_block_at(pos)?;
            map.block_advance.insert(pos, advance);

            if !map.partial {
                map.blocks.set(pos, data.clone());
                (map.progress)(pos as f64 / size_pct);
            }

            // Records and the header itself cross block boundaries; keep the
            // undecoded tail and retry with the next block appended.
            remainder.extend_from_slice(&data);
            if !complete_header {
                if let Some((header, consumed)) = parse_header(&remainder)? {
                    map.header = header.text;
                    map.references = header.references;
                    complete_header = true;
                    remainder.drain(..consumed);
                    let consumed = drain_alignments(&remainder, &mut map.alignments)?;
                    remainder.drain(..consumed);
                    if map.partial {
                        break;
                    }
                }
            } else {
                let consumed = drain_alignments(&remainder, &mut map.alignments)?;
                remainder.drain(..consumed);
            }

            pos += advance as i64;
        }

        if map.partial {
            map.reader = Some(reader);
        }
        (map.progress)(-1.0);

        let mut bai_path = path.as_os_str().to_os_string();
        bai_path.push(".bai");
        match BaiIndex::load(&bai_path, &map.progress) {
            Ok(index) => map.index = Some(index),
            Err(BamScopeError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                log::warn!("no index available for {}", path.display());
            }
            Err(e) => return Err(e),
        }
        Ok(map)
    }

    /// Whether the file was too large to preload and is read on demand.
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// Returns an alignment of the region: one space-padded row of width
    /// `end - begin` per overlapping record.
    ///
    /// Overlap uses the record's reported extent `[pos, pos + template_len]`
    /// rather than its decoded CIGAR; the template length is the paired-end
    /// insert size, so this is a deliberate approximation.
    ///
    /// # Panics
    ///
    /// `ref_id` must index the reference table and
    /// `begin < end <= reference.length`; violations are programming errors.
    ///
    /// # Errors
    ///
    /// Returns [`BamScopeError::UnindexedQuery`] for a partial-mode file
    /// without an index, and surfaces corruption discovered while reading
    /// chunks.
    pub fn get_map(&mut self, ref_id: i32, begin: u64, end: u64) -> Result<Vec<String>> {
        let reference = &self.references[ref_id as usize];
        assert!(
            begin < end && begin <= reference.length as u64 && end <= reference.length as u64,
            "invalid range {}..{} for {} ({} bp)",
            begin,
            end,
            reference.name,
            reference.length,
        );

        let bin_id = reg2bin(begin, end);
        let chunks = match &self.index {
            None => return self.noindex_get_map(ref_id, begin, end),
            Some(index) => index.refs[ref_id as usize]
                .bins
                .get(&bin_id)
                .cloned()
                .unwrap_or_default(),
        };

        let mut result = Vec::new();

        let chunk_pct = 100.0 / chunks.len() as f64;
        let mut done_pct = 0.0;
        for chunk in chunks {
            let mut pi = chunk.begin.compressed();
            let mut po = chunk.begin.uncompressed() as usize;
            let end_block = chunk.end.compressed();
            done_pct += chunk_pct;
            (self.progress)(done_pct);

            let mut remainder: Vec<u8> = Vec::new();
            let mut done = false;
            while pi <= end_block {
                let hit = match self.blocks.get(pi) {
                    Some(block) => {
                        remainder.extend_from_slice(&block[po..]);
                        true
                    }
                    None => false,
                };
                if !hit {
                    let block = self.load_block(pi)?;
                    remainder.extend_from_slice(&block[po..]);
                }
                pi += self.block_advance[&pi] as i64;

                let mut offs = 0;
                while remainder.len() - offs >= 4 {
                    let block_size = u32::from_le_bytes([
                        remainder[offs],
                        remainder[offs + 1],
                        remainder[offs + 2],
                        remainder[offs + 3],
                    ]) as usize;
                    if remainder.len() - offs < 4 + block_size {
                        break;
                    }
                    let alignment = parse_alignment(&remainder[offs + 4..offs + 4 + block_size])?;
                    if alignment.ref_id != ref_id {
                        // Records are sorted by reference then position, so
                        // a different reference ends this chunk.
                        done = true;
                        break;
                    }
                    if overlaps(&alignment, begin, end) {
                        result.push(format_row(&alignment.seq_packed, alignment.pos, begin, end));
                    }
                    offs += 4 + block_size;
                }
                remainder.drain(..offs);
                if done {
                    break;
                }
                po = 0;
            }
        }
        (self.progress)(-1.0);
        Ok(result)
    }

    /// Serve a region query from the preloaded alignment list.
    fn noindex_get_map(&mut self, ref_id: i32, begin: u64, end: u64) -> Result<Vec<String>> {
        if self.partial {
            return Err(BamScopeError::UnindexedQuery);
        }
        let result = self
            .alignments
            .iter()
            .filter(|a| a.ref_id == ref_id && overlaps(a, begin, end))
            .map(|a| format_row(&a.seq_packed, a.pos, begin, end))
            .collect();
        Ok(result)
    }

    /// Fetch, cache, and return the block starting at `offset`, recording its
    /// compressed length in the block-advance table.
    fn load_block(&mut self, offset: i64) -> Result<Vec<u8>> {
        let reader = self
            .reader
            .as_mut()
            .expect("block reader is retained in partial mode");
        let (data, advance) = reader.read_block_at(offset)?;
        self.block_advance.insert(offset, advance);
        self.blocks.set(offset, data.clone());
        Ok(data)
    }
}

/// Whether the record's reported extent `[pos, pos + template_len]` reaches
/// into `[begin, end]`.
fn overlaps(alignment: &Alignment, begin: u64, end: u64) -> bool {
    alignment.pos as i64 + alignment.template_len as i64 >= begin as i64
        && alignment.pos as i64 <= end as i64
}

/// Render one record as a text row of exactly `end - begin` characters:
/// the unpacked sequence shifted by `pos - begin`, padded and clipped with
/// spaces on both sides.
fn format_row(seq_packed: &[u8], pos: i32, begin: u64, end: u64) -> String {
    let seq = unpack_sequence(seq_packed);
    let shift = pos as i64 - begin as i64;

    let mut row = if shift > 0 {
        let mut padded = " ".repeat(shift as usize);
        padded.push_str(&seq);
        padded
    } else {
        let trim = (-shift) as usize;
        if trim >= seq.len() {
            String::new()
        } else {
            seq[trim..].to_string()
        }
    };

    let span = (end - begin) as usize;
    if row.len() > span {
        row.truncate(span);
    } else {
        let pad = span - row.len();
        row.extend(std::iter::repeat(' ').take(pad));
    }
    row
}
