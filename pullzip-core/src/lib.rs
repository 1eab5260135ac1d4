//! # pullzip Core
//!
//! Core components for the pullzip ZIP archive reader.
//!
//! This crate provides the fundamental building blocks the codec and
//! container layers are assembled from:
//!
//! - [`error`]: the shared error type and `Result` alias
//! - [`crc`]: table-driven CRC-32 with incremental update
//! - [`bitstream`]: LSB-first bit-level input for variable-length codes
//! - [`window`]: sliding output window for back-reference expansion
//! - [`source`]: the random-access byte source contract and adapters
//! - [`traits`]: the pull-based streaming contract of the read pipeline
//!
//! ## Architecture
//!
//! pullzip is designed as a layered stack:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ L3: Container (pullzip)                                 │
//! │     directory parsing, ZipCrypto, member pipeline       │
//! ├─────────────────────────────────────────────────────────┤
//! │ L2: Codec (pullzip-deflate)                             │
//! │     DEFLATE block decode, canonical Huffman             │
//! ├─────────────────────────────────────────────────────────┤
//! │ L1: Primitives (this crate)                             │
//! │     BitReader, Window, Crc32, Source, PullRead          │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use pullzip_core::crc::Crc32;
//!
//! let crc = Crc32::compute(b"123456789");
//! assert_eq!(crc, 0xCBF43926);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bitstream;
pub mod crc;
pub mod error;
pub mod source;
pub mod traits;
pub mod window;

// Re-exports for convenience
pub use bitstream::BitReader;
pub use crc::Crc32;
pub use error::{Result, ZipError};
pub use source::{MemorySource, MmapSource, Source, StreamSource};
pub use traits::PullRead;
pub use window::Window;
