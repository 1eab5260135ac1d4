//! The archive façade.

use std::path::Path;
use std::sync::Arc;

use pullzip_core::error::{Result, ZipError};
use pullzip_core::source::{MmapSource, Source};
use pullzip_core::traits::PullRead;

use crate::directory;
use crate::header::FileHeader;
use crate::read;

/// An opened ZIP archive.
///
/// Holds the parsed central directory (immutable after construction)
/// and the shared byte source. Member handles opened from one archive
/// are independent of each other; they may be read in parallel when
/// the underlying source tolerates concurrent positional reads, which
/// every bundled [`Source`] does.
pub struct ZipArchive {
    source: Arc<dyn Source>,
    directory: Vec<FileHeader>,
}

impl std::fmt::Debug for ZipArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipArchive")
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}

impl ZipArchive {
    /// Open an archive over any random-access source.
    pub fn open<S: Source + 'static>(source: S) -> Result<Self> {
        Self::from_source(Arc::new(source))
    }

    /// Open an archive over an already-shared source.
    pub fn from_source(source: Arc<dyn Source>) -> Result<Self> {
        let directory = directory::read_directory(source.as_ref())?;
        Ok(Self { source, directory })
    }

    /// Open an archive file from disk, memory-mapped.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(MmapSource::open(path)?)
    }

    /// The parsed central directory.
    pub fn files(&self) -> &[FileHeader] {
        &self.directory
    }

    /// Number of members in the archive.
    pub fn len(&self) -> usize {
        self.directory.len()
    }

    /// Whether the archive has no members.
    pub fn is_empty(&self) -> bool {
        self.directory.is_empty()
    }

    /// Open the first member whose path equals `path`.
    ///
    /// `password` is required iff the member is encrypted; it is
    /// ignored otherwise.
    pub fn open_file(&self, path: &str, password: Option<&[u8]>) -> Result<ZipFile> {
        for header in &self.directory {
            if header.path == path {
                return self.open_header(header, password);
            }
        }
        Err(ZipError::no_such_member(path))
    }

    /// Open the member at `index`, bounds-checked.
    pub fn open_file_by_index(&self, index: usize, password: Option<&[u8]>) -> Result<ZipFile> {
        let header = self
            .directory
            .get(index)
            .ok_or_else(|| ZipError::no_such_member(format!("index {index}")))?;
        self.open_header(header, password)
    }

    fn open_header(&self, header: &FileHeader, password: Option<&[u8]>) -> Result<ZipFile> {
        let reader = read::open_member(Arc::clone(&self.source), header, password)?;
        Ok(ZipFile {
            header: header.clone(),
            reader,
        })
    }
}

/// An active read handle for one archive member.
///
/// Move-only; bytes are delivered in strict stream order across
/// successive [`read`](Self::read) calls, and the running CRC-32 is
/// finalized on the pull that delivers the last byte.
pub struct ZipFile {
    header: FileHeader,
    reader: Box<dyn PullRead + Send>,
}

impl ZipFile {
    /// The member's directory entry.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// The member's path within the archive.
    pub fn path(&self) -> &str {
        &self.header.path
    }

    /// The member's uncompressed size.
    pub fn size(&self) -> u64 {
        self.header.uncompressed_size
    }

    /// Read uncompressed bytes into `buf`.
    ///
    /// Returns the number of bytes produced, which is less than the
    /// request only at end of stream; 0 means EOF. Requests larger
    /// than 1 GiB are split into successive inner pulls so downstream
    /// layers operate in bounded sizes.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        const CHUNK: usize = 1 << 30;

        let mut total = 0usize;
        while total < buf.len() {
            let end = (total + CHUNK).min(buf.len());
            let n = self.reader.pull(&mut buf[total..end])?;
            total += n;
            if n == 0 {
                break;
            }
        }
        Ok(total)
    }

    /// Read the member to EOF and return its content.
    pub fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let capacity = self.header.uncompressed_size.min(1 << 20) as usize;
        let mut out = Vec::with_capacity(capacity);
        let mut chunk = [0u8; 65536];
        loop {
            let n = self.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        Ok(out)
    }
}

impl std::fmt::Debug for ZipFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipFile")
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}
