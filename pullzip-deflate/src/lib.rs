//! # pullzip DEFLATE
//!
//! A from-scratch DEFLATE (RFC 1951) decoder.
//!
//! The decoder is strictly pull-based: it consumes compressed bytes
//! from any [`PullRead`](pullzip_core::PullRead) producer and yields
//! uncompressed bytes on demand, holding only bounded state (a 64 KiB
//! input buffer, the 64 KiB sliding window, one staged output span and
//! the Huffman tables of the current block).
//!
//! - [`huffman`]: canonical Huffman decoder with a lookup-table fast path
//! - [`tables`]: fixed code-length and length/distance decode tables
//! - [`inflate`]: block state machine and the byte-oriented reader
//!
//! ## Example
//!
//! ```rust
//! use pullzip_deflate::inflate::inflate;
//!
//! // A single stored block holding "Hi"
//! let compressed = [0x01, 0x02, 0x00, 0xFD, 0xFF, b'H', b'i'];
//! assert_eq!(inflate(&compressed).unwrap(), b"Hi");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod huffman;
pub mod inflate;
pub mod tables;

pub use huffman::HuffmanDecoder;
pub use inflate::{inflate, InflateReader, InflateStream};
