//! # pullzip
//!
//! A streaming reader for the ZIP archive container.
//!
//! pullzip opens a ZIP file presented as a random-access byte source,
//! parses its central directory (ZIP64 preferred when present), and
//! exposes each member as an independently readable byte stream. The
//! compressed payload is inflated on demand by a from-scratch DEFLATE
//! decoder and validated against the archive's CRC-32 as it flows.
//!
//! Reading is strictly synchronous and pull-based: no threads, no
//! background prefetch, no allocation proportional to member size.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pullzip::ZipArchive;
//!
//! # fn main() -> pullzip::Result<()> {
//! let archive = ZipArchive::open_path("bundle.zip")?;
//! for header in archive.files() {
//!     println!("{} ({} bytes)", header.path, header.uncompressed_size);
//! }
//!
//! let mut file = archive.open_file("readme.txt", None)?;
//! let content = file.read_to_end()?;
//! # let _ = content;
//! # Ok(())
//! # }
//! ```
//!
//! Members encrypted with the traditional PKWARE cipher are opened by
//! passing a password; the 12-byte encryption header is checked before
//! any payload byte is produced, and the CRC is always validated on
//! top of that.
//!
//! ## Feature flags
//!
//! - `bzip2`: enables decoding of members compressed with method 12
//!   through the `bzip2` crate. Without it such members report
//!   [`ZipError::UnsupportedCompression`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod archive;
#[cfg(feature = "bzip2")]
mod bzip2;
pub mod crypto;
mod directory;
pub mod header;
mod read;

pub use archive::{ZipArchive, ZipFile};
pub use header::{CompressionMethod, FileHeader};
pub use pullzip_core::{
    MemorySource, MmapSource, PullRead, Result, Source, StreamSource, ZipError,
};
