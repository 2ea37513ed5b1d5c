//! Error types for bamscope

use thiserror::Error;

/// Result type alias for bamscope operations
pub type Result<T> = std::result::Result<T, BamScopeError>;

/// Error types that can occur while reading BAM and BAI files
#[derive(Debug, Error)]
pub enum BamScopeError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not end with the 28-byte BGZF EOF sentinel
    #[error("invalid end-of-file marker (possibly truncated?)")]
    Truncated,

    /// A BGZF member failed to parse or decompress
    #[error("invalid BGZF block at offset {offset}: {msg}")]
    InvalidBgzf {
        /// Compressed file offset of the block
        offset: i64,
        /// What went wrong
        msg: String,
    },

    /// The uncompressed stream does not start with a valid BAM header
    #[error("invalid BAM header: {0}")]
    InvalidHeader(String),

    /// The companion `.bai` index is malformed
    #[error("invalid index file: {0}")]
    InvalidIndex(String),

    /// An alignment record over-read its enclosing block
    #[error("malformed alignment record at offset {offset}: {msg}")]
    MalformedRecord {
        /// Byte offset within the record body where parsing failed
        offset: usize,
        /// What was being read
        msg: String,
    },

    /// Region query on a partial-mode file that has no index
    #[error("bam file is too large - please index it")]
    UnindexedQuery,
}
