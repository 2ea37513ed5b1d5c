//! Load-time configuration.
//!
//! The per-file memory budget decides whether [`AlignmentMap::load`] keeps
//! every decompressed block in memory or falls back to an on-demand reader
//! backed by a bounded cache. The budget and the progress callback travel
//! together in a [`LoadConfig`] value handed to
//! [`AlignmentMap::load_with`].
//!
//! [`AlignmentMap::load`]: crate::AlignmentMap::load
//! [`AlignmentMap::load_with`]: crate::AlignmentMap::load_with

use crate::progress::{null_progress, ProgressFn};

/// Default (approximate) maximum memory usage per BAM file: 500 MiB.
pub const DEFAULT_MAX_MEMORY: u64 = 500 * 1024 * 1024;

/// Uncompressed span of one BGZF block, used to convert a memory budget into
/// a block count.
pub const BLOCK_SPAN: u64 = 65536;

/// Configuration for loading one BAM file.
pub struct LoadConfig {
    /// Approximate maximum memory to spend on decompressed blocks.
    pub max_memory: u64,
    /// Progress callback invoked during load, index load, and region queries.
    pub progress: ProgressFn,
}

impl LoadConfig {
    /// How many decompressed blocks the memory budget allows.
    ///
    /// With the default 500 MiB budget this is 8000.
    pub fn max_cached_blocks(&self) -> u64 {
        self.max_memory / BLOCK_SPAN
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            max_memory: DEFAULT_MAX_MEMORY,
            progress: null_progress(),
        }
    }
}

/// Parse a human-readable memory size such as `"500M"` or `"2gb"`.
///
/// Recognizes the suffixes `K`, `M`, `G`, `T` (powers of 1024), optionally
/// followed by `B`, case-insensitive. A bare number is taken as bytes.
/// Returns `None` when the numeric part does not parse.
pub fn parse_memory_size(s: &str) -> Option<u64> {
    let mut s = s.trim().to_ascii_uppercase();
    if let Some(stripped) = s.strip_suffix('B') {
        s = stripped.to_string();
    }
    let mult: u64 = match s.chars().last()? {
        'K' => 1024,
        'M' => 1024 * 1024,
        'G' => 1024 * 1024 * 1024,
        'T' => 1024 * 1024 * 1024 * 1024,
        _ => 1,
    };
    if mult > 1 {
        s.pop();
    }
    s.parse::<u64>().ok().map(|n| n * mult)
}
