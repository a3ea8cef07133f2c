//! Streaming packfile parser.
//!
//! A packfile concatenates a 12-byte container header, `entry_count`
//! objects (each optionally delta-encoded against an earlier object), and
//! a trailing whole-stream digest. This crate decodes that container
//! incrementally: callers push arbitrary-sized byte chunks through
//! [`parser::Parser::feed`] — a file read, a network read, anything — and
//! the parser emits structured events to a [`PackVisitor`] as it goes,
//! without ever needing the whole pack in memory at once.
//!
//! It does not resolve deltas, build a pack index, or write anything to
//! disk; it only decodes and attests (per-object CRC32, per-object
//! identity hash, whole-stream checksum).

mod kind;
pub mod parser;
pub mod visitor;

pub use kind::ObjectKind;
pub use visitor::{NullVisitor, PackVisitor};

/// `"PACK"`, the first four bytes of every packfile.
pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";

/// The only packfile container version this parser understands.
pub const PACK_VERSION: u32 = 2;

/// Size in bytes of the container header (signature + version + entry count).
pub const PACK_HEADER_SIZE: usize = 12;

/// Errors that abort a [`parser::Parser`] permanently.
///
/// Every variant is terminal: once returned from `feed` or `finish`, the
/// parser's state becomes `Failed` and every subsequent call returns
/// [`ParseError::AlreadyFailed`] until the parser is dropped.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid packfile signature")]
    InvalidSignature,

    #[error("unsupported packfile version {0} (only version 2 is supported)")]
    UnsupportedVersion(u32),

    #[error("invalid object kind bits {0} (must be 1-4, 6, or 7)")]
    InvalidObjectKind(u8),

    #[error("object size exceeds the platform's size type")]
    SizeOverflow,

    #[error("offset-delta base offset exceeds u64")]
    OffsetOverflow,

    #[error("offset-delta base offset {base_offset} is not before entry offset {entry_offset}")]
    InvalidBaseOffset { entry_offset: u64, base_offset: u64 },

    #[error("decompression failed: {0}")]
    DecompressionFailed(#[from] flate2::DecompressError),

    #[error("packfile checksum mismatch")]
    ChecksumMismatch,

    #[error("finish() called before the packfile was fully parsed")]
    TruncatedInput,

    #[error("feed() called with data after the packfile was already complete")]
    DataAfterCompletion,

    #[error("feed() or finish() called after the parser already failed")]
    AlreadyFailed,

    #[error("internal parser state was inconsistent (this is a bug)")]
    Inconsistent,

    #[error(transparent)]
    Hash(#[from] git_hash::HashError),
}
