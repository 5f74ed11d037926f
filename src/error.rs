use crate::signatures::FormatTag;
use thiserror::Error;

/// Why a located signature could not be resolved into a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("no end-of-image trailer before blob end")]
    MissingTrailer,

    #[error("declared length {declared} is below the minimum header size")]
    LengthTooSmall { declared: u32 },

    #[error("declared length {declared} runs past the end of the blob")]
    LengthOutOfBounds { declared: u32 },

    #[error("not enough bytes after the magic to read the header")]
    TruncatedHeader,
}

/// A dropped candidate. Recovered locally; the scan always continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{format} candidate at offset {offset:#x}: {reason}")]
pub struct Rejection {
    pub offset: usize,
    pub format: FormatTag,
    pub reason: RejectReason,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("corrupt gzip stream: {0}")]
    Gzip(#[source] std::io::Error),

    #[error("corrupt lz4 frame: {0}")]
    Lz4(#[source] std::io::Error),

    #[error("legacy lz4 frame (02 21 4C 18) is not supported by the built-in decoder")]
    LegacyLz4Frame,
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("not a cpio newc archive (bad magic at entry {index})")]
    BadMagic { index: usize },

    #[error("cpio entry {index}: malformed header field")]
    BadHeaderField { index: usize },

    #[error("cpio entry {index} ({name:?}) is truncated")]
    Truncated { index: usize, name: String },
}
