//! Random-access byte sources.
//!
//! The archive reader consumes its input through one contract: an
//! exact positional read of `buf.len()` bytes at a non-negative
//! offset that may exceed 2^31. Short reads are errors, and a source
//! never changes length while an archive holds it.
//!
//! Three adapters cover the common cases:
//!
//! - [`MemorySource`] over an owned byte buffer
//! - [`StreamSource`] serializing a sequential `Read + Seek` stream
//!   through a mutex, with an absolute seek before every read
//! - [`MmapSource`] memory-mapping an on-disk archive read-only
//!
//! All sources are `Send + Sync`; an archive shares one source among
//! every member handle it opens, so positional safety is the source's
//! responsibility (the mutex adapter simply serializes callers).

use crate::error::Result;
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

/// A random-access byte source of known length.
pub trait Source: Send + Sync {
    /// Total length of the source in bytes.
    fn len(&self) -> u64;

    /// Read exactly `buf.len()` bytes starting at `offset`.
    ///
    /// Reading past the end of the source fails.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Whether the source is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn out_of_range(offset: u64, len: usize, total: u64) -> crate::ZipError {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("read of {len} bytes at offset {offset} exceeds source length {total}"),
    )
    .into()
}

/// An in-memory byte source.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Box<[u8]>,
}

impl MemorySource {
    /// Create a source over the given bytes.
    pub fn new(data: impl Into<Box<[u8]>>) -> Self {
        Self { data: data.into() }
    }

    /// Borrow the underlying bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for MemorySource {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl Source for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let end = offset
            .checked_add(buf.len() as u64)
            .filter(|&end| end <= self.data.len() as u64)
            .ok_or_else(|| out_of_range(offset, buf.len(), self.len()))?;
        buf.copy_from_slice(&self.data[offset as usize..end as usize]);
        Ok(())
    }
}

/// Adapter serializing a sequential stream into a positional source.
///
/// Every read locks the stream, performs an absolute seek, then an
/// exact read. The declared length is supplied at construction and
/// must be consistent with the underlying object.
#[derive(Debug)]
pub struct StreamSource<R> {
    inner: Mutex<R>,
    length: u64,
}

impl<R: Read + Seek> StreamSource<R> {
    /// Wrap a stream whose total length is already known.
    pub fn new(inner: R, length: u64) -> Self {
        Self {
            inner: Mutex::new(inner),
            length,
        }
    }

    /// Wrap a stream, determining its length by seeking to the end.
    pub fn from_stream(mut inner: R) -> Result<Self> {
        let length = inner.seek(SeekFrom::End(0))?;
        Ok(Self::new(inner, length))
    }
}

impl<R: Read + Seek + Send> Source for StreamSource<R> {
    fn len(&self) -> u64 {
        self.length
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if offset
            .checked_add(buf.len() as u64)
            .map_or(true, |end| end > self.length)
        {
            return Err(out_of_range(offset, buf.len(), self.length));
        }
        let mut inner = self.inner.lock().expect("source mutex poisoned");
        inner.seek(SeekFrom::Start(offset))?;
        inner.read_exact(buf)?;
        Ok(())
    }
}

/// A read-only memory-mapped file source.
///
/// Mapping lets the operating system handle paging, which suits the
/// scattered reads a ZIP directory walk performs, and positional
/// reads need no locking at all.
#[derive(Debug)]
pub struct MmapSource {
    map: Mmap,
}

impl MmapSource {
    /// Open and map the file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_file(&file)
    }

    /// Map an already-open file.
    pub fn from_file(file: &File) -> Result<Self> {
        // SAFETY: read-only mapping; the caller is responsible for not
        // truncating the file while the archive holds it.
        let map = unsafe { Mmap::map(file)? };
        Ok(Self { map })
    }
}

impl Source for MmapSource {
    fn len(&self) -> u64 {
        self.map.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let end = offset
            .checked_add(buf.len() as u64)
            .filter(|&end| end <= self.map.len() as u64)
            .ok_or_else(|| out_of_range(offset, buf.len(), self.len()))?;
        buf.copy_from_slice(&self.map[offset as usize..end as usize]);
        Ok(())
    }
}
