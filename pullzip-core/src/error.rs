//! Error types for pullzip operations.
//!
//! A single error enum covers all failure conditions across the
//! workspace: source I/O, container parsing, decryption, DEFLATE
//! decoding and integrity validation. Every error is fatal to the
//! operation that produced it and surfaces at the API boundary;
//! nothing is retried internally, and a failed member read does not
//! invalidate the archive it came from.

use std::io;
use thiserror::Error;

/// The main error type for pullzip operations.
#[derive(Debug, Error)]
pub enum ZipError {
    /// I/O error from the underlying byte source.
    #[error("source I/O error: {0}")]
    Io(#[from] io::Error),

    /// No end-of-directory record was found in the tail of the input.
    #[error("not a ZIP archive: no end of central directory record found")]
    NotAZipArchive,

    /// The central directory contradicts itself or its declared geometry.
    #[error("malformed central directory: {message}")]
    MalformedDirectory {
        /// Description of the inconsistency.
        message: String,
    },

    /// The declared central directory size exceeds the 1 GiB safety cap.
    #[error("central directory too large: {size} bytes")]
    DirectoryTooLarge {
        /// Declared directory size in bytes.
        size: u64,
    },

    /// The local file header at a member's recorded offset does not
    /// carry the expected signature.
    #[error("local file header signature mismatch at offset {offset}")]
    LocalHeaderMismatch {
        /// Archive offset the header was read from.
        offset: u64,
    },

    /// No member with the requested path exists in the archive.
    #[error("no such member: {path}")]
    NoSuchMember {
        /// The requested member path.
        path: String,
    },

    /// The member uses a compression method this build cannot decode.
    #[error("unsupported compression method: {method}")]
    UnsupportedCompression {
        /// The raw compression method identifier.
        method: u16,
    },

    /// The ZipCrypto header check byte did not match the member CRC.
    #[error("supplied password is not correct")]
    BadPassword,

    /// A bit pattern matched no registered Huffman code.
    #[error("invalid Huffman code at bit position {bit_position}")]
    InvalidHuffmanCode {
        /// Bit position in the compressed stream.
        bit_position: u64,
    },

    /// The code-length sequence of a dynamic block is inconsistent.
    #[error("invalid code lengths: {message}")]
    InvalidCodeLengths {
        /// Description of the inconsistency.
        message: String,
    },

    /// A stored block's LEN/NLEN complement check failed.
    #[error("invalid stored block lengths")]
    InvalidStoredBlock,

    /// A block header carried the reserved block type.
    #[error("invalid block type {btype}")]
    InvalidBlockType {
        /// The raw BTYPE value.
        btype: u8,
    },

    /// A back-reference reaches before the start of the produced stream.
    #[error("invalid back-reference distance {distance}, only {available} bytes produced")]
    InvalidDistance {
        /// The decoded distance.
        distance: usize,
        /// Bytes of history actually available.
        available: usize,
    },

    /// A decoded symbol lies outside its alphabet.
    #[error("invalid alphabet symbol {symbol}")]
    InvalidAlphabet {
        /// The out-of-range symbol.
        symbol: u16,
    },

    /// The stream ended while uncompressed bytes were still expected.
    #[error("short read: {expected} more bytes expected")]
    ShortRead {
        /// Number of bytes still expected.
        expected: u64,
    },

    /// A member produced more bytes than its declared uncompressed size.
    #[error("member produced more data than its declared size")]
    SizeMismatch,

    /// Running CRC-32 of the uncompressed content did not match the
    /// directory's expectation.
    #[error("CRC mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    CrcMismatch {
        /// Expected CRC value from the archive.
        expected: u32,
        /// Computed CRC value over the produced data.
        computed: u32,
    },

    /// The BZIP2 back-end rejected the compressed stream.
    #[error("invalid bzip2 stream: {message}")]
    InvalidBzip2Stream {
        /// Decoder diagnostic.
        message: String,
    },
}

/// Result type alias for pullzip operations.
pub type Result<T> = std::result::Result<T, ZipError>;

impl ZipError {
    /// Create a malformed directory error.
    pub fn malformed_directory(message: impl Into<String>) -> Self {
        Self::MalformedDirectory {
            message: message.into(),
        }
    }

    /// Create a local header mismatch error.
    pub fn local_header_mismatch(offset: u64) -> Self {
        Self::LocalHeaderMismatch { offset }
    }

    /// Create a no-such-member error.
    pub fn no_such_member(path: impl Into<String>) -> Self {
        Self::NoSuchMember { path: path.into() }
    }

    /// Create an unsupported compression error.
    pub fn unsupported_compression(method: u16) -> Self {
        Self::UnsupportedCompression { method }
    }

    /// Create an invalid Huffman code error.
    pub fn invalid_huffman(bit_position: u64) -> Self {
        Self::InvalidHuffmanCode { bit_position }
    }

    /// Create an invalid code lengths error.
    pub fn invalid_code_lengths(message: impl Into<String>) -> Self {
        Self::InvalidCodeLengths {
            message: message.into(),
        }
    }

    /// Create an invalid distance error.
    pub fn invalid_distance(distance: usize, available: usize) -> Self {
        Self::InvalidDistance {
            distance,
            available,
        }
    }

    /// Create an invalid alphabet error.
    pub fn invalid_alphabet(symbol: u16) -> Self {
        Self::InvalidAlphabet { symbol }
    }

    /// Create a short read error.
    pub fn short_read(expected: u64) -> Self {
        Self::ShortRead { expected }
    }

    /// Create a CRC mismatch error.
    pub fn crc_mismatch(expected: u32, computed: u32) -> Self {
        Self::CrcMismatch { expected, computed }
    }

    /// Create an invalid bzip2 stream error.
    pub fn invalid_bzip2_stream(message: impl Into<String>) -> Self {
        Self::InvalidBzip2Stream {
            message: message.into(),
        }
    }
}
