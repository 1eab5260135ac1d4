//! End-of-directory location and central directory parsing.
//!
//! The end-of-central-directory record sits at an unknown offset near
//! the archive tail because of the trailing variable-length comment.
//! Up to the last 4 KiB are read into a tail buffer and searched in
//! three steps: the minimum possible record offset first (comment
//! length 0), then the last 256 bytes, then the whole tail. Checking
//! the smallest plausible offsets first avoids false positives inside
//! compressed payload, and every signature hit is validated against
//! the record geometry so a signature planted in the comment cannot
//! shadow the genuine record.
//!
//! Both record variants share the search strategy and differ only in
//! field widths; the parser is generic over the common interface, and
//! a found ZIP64 record takes precedence over the classic one. The
//! ZIP64 record is reached first through the locator that sits
//! immediately before the classic end record, which carries its exact
//! archive offset; the signature scan over the tail is the fallback
//! when no usable locator is present.

use pullzip_core::error::{Result, ZipError};
use pullzip_core::source::Source;

use crate::header::{
    read_u16, read_u32, read_u64, CentralDirectoryHeader, FileHeader, END_OF_CENTRAL_DIR_SIG,
    ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIG, ZIP64_END_OF_CENTRAL_DIR_SIG,
};

/// How much of the archive tail is searched for the record.
const MAX_TAIL_SEARCH: u64 = 4096;

/// Safety cap on the declared central directory size.
const MAX_DIRECTORY_SIZE: u64 = 1 << 30;

/// Common interface of the two end-of-directory record variants.
pub(crate) trait DirectoryEnd: Sized {
    /// The record's little-endian signature.
    const SIGNATURE: u32;
    /// Size of the record's fixed part.
    const FIXED_SIZE: usize;

    /// Parse the record at the start of `buf`; `None` if it does not fit.
    fn parse(buf: &[u8]) -> Option<Self>;

    /// Whether a record found at `offset` in a tail buffer of
    /// `tail_len` bytes is geometrically consistent.
    fn is_consistent(&self, offset: usize, tail_len: usize) -> bool;

    /// Archive offset of the central directory.
    fn cd_offset(&self) -> u64;
    /// Size of the central directory in bytes.
    fn cd_size(&self) -> u64;
    /// Total number of directory entries.
    fn cd_entries(&self) -> u64;
}

/// Classic end of central directory record (22 bytes + comment).
#[derive(Debug, Clone)]
pub(crate) struct EndOfDirectory {
    pub cd_entries_total: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl DirectoryEnd for EndOfDirectory {
    const SIGNATURE: u32 = END_OF_CENTRAL_DIR_SIG;
    const FIXED_SIZE: usize = 22;

    fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::FIXED_SIZE {
            return None;
        }
        Some(Self {
            cd_entries_total: read_u16(buf, 10),
            cd_size: read_u32(buf, 12),
            cd_offset: read_u32(buf, 16),
            comment_len: read_u16(buf, 20),
        })
    }

    fn is_consistent(&self, offset: usize, tail_len: usize) -> bool {
        // The comment must run exactly to the end of the archive
        offset + Self::FIXED_SIZE + self.comment_len as usize == tail_len
    }

    fn cd_offset(&self) -> u64 {
        self.cd_offset as u64
    }

    fn cd_size(&self) -> u64 {
        self.cd_size as u64
    }

    fn cd_entries(&self) -> u64 {
        self.cd_entries_total as u64
    }
}

/// ZIP64 end of central directory record (56 fixed bytes).
#[derive(Debug, Clone)]
pub(crate) struct Zip64EndOfDirectory {
    pub record_size: u64,
    pub cd_entries_total: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl DirectoryEnd for Zip64EndOfDirectory {
    const SIGNATURE: u32 = ZIP64_END_OF_CENTRAL_DIR_SIG;
    const FIXED_SIZE: usize = 56;

    fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::FIXED_SIZE {
            return None;
        }
        Some(Self {
            record_size: read_u64(buf, 4),
            cd_entries_total: read_u64(buf, 32),
            cd_size: read_u64(buf, 40),
            cd_offset: read_u64(buf, 48),
        })
    }

    fn is_consistent(&self, _offset: usize, _tail_len: usize) -> bool {
        self.is_plausible()
    }

    fn cd_offset(&self) -> u64 {
        self.cd_offset
    }

    fn cd_size(&self) -> u64 {
        self.cd_size
    }

    fn cd_entries(&self) -> u64 {
        self.cd_entries_total
    }
}

impl Zip64EndOfDirectory {
    /// record_size counts everything after its own field.
    fn is_plausible(&self) -> bool {
        self.record_size >= Self::FIXED_SIZE as u64 - 12
    }
}

/// ZIP64 end of central directory locator (20 bytes).
///
/// Sits immediately before the classic end record and carries the
/// archive offset of the ZIP64 record.
#[derive(Debug, Clone)]
pub(crate) struct Zip64Locator {
    pub disk_with_zip64_eocd: u32,
    pub zip64_eocd_offset: u64,
    pub total_disks: u32,
}

impl Zip64Locator {
    pub(crate) const SIGNATURE: u32 = ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIG;
    pub(crate) const FIXED_SIZE: usize = 20;

    pub(crate) fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::FIXED_SIZE || read_u32(buf, 0) != Self::SIGNATURE {
            return None;
        }
        Some(Self {
            disk_with_zip64_eocd: read_u32(buf, 4),
            zip64_eocd_offset: read_u64(buf, 8),
            total_disks: read_u32(buf, 16),
        })
    }
}

/// Scan one window of the tail buffer forward for a consistent record.
fn search_window<T: DirectoryEnd>(tail: &[u8], from: usize) -> Option<(usize, T)> {
    let signature = T::SIGNATURE.to_le_bytes();
    let mut at = from;
    while at + 4 <= tail.len() {
        if tail[at..at + 4] == signature {
            if let Some(record) = T::parse(&tail[at..]) {
                if record.is_consistent(at, tail.len()) {
                    return Some((at, record));
                }
            }
        }
        at += 1;
    }
    None
}

/// Three-step search over the tail buffer: minimum record offset,
/// last 256 bytes, whole buffer. First consistent match wins; the
/// record's offset within the tail is returned alongside it.
fn find_directory_end_at<T: DirectoryEnd>(tail: &[u8]) -> Option<(usize, T)> {
    search_window(tail, tail.len().saturating_sub(22))
        .or_else(|| search_window(tail, tail.len().saturating_sub(256)))
        .or_else(|| search_window(tail, 0))
}

/// Three-step search over the tail buffer, record only.
pub(crate) fn find_directory_end<T: DirectoryEnd>(tail: &[u8]) -> Option<T> {
    find_directory_end_at(tail).map(|(_, record)| record)
}

/// Follow the ZIP64 locator sitting immediately before the classic
/// end record, when one is there, and read the ZIP64 record it points
/// at. Anything implausible (split archive, offset out of range,
/// wrong signature at the target) falls back to the signature scan.
fn zip64_via_locator(
    source: &dyn Source,
    tail: &[u8],
    classic_at: Option<usize>,
) -> Result<Option<Zip64EndOfDirectory>> {
    let at = match classic_at {
        Some(at) if at >= Zip64Locator::FIXED_SIZE => at,
        _ => return Ok(None),
    };
    let locator = match Zip64Locator::parse(&tail[at - Zip64Locator::FIXED_SIZE..at]) {
        Some(locator) => locator,
        None => return Ok(None),
    };
    if locator.disk_with_zip64_eocd != 0 || locator.total_disks > 1 {
        return Ok(None);
    }
    let record_end = locator
        .zip64_eocd_offset
        .checked_add(Zip64EndOfDirectory::FIXED_SIZE as u64);
    if record_end.map_or(true, |end| end > source.len()) {
        return Ok(None);
    }

    let mut buf = [0u8; Zip64EndOfDirectory::FIXED_SIZE];
    source.read_at(locator.zip64_eocd_offset, &mut buf)?;
    if read_u32(&buf, 0) != Zip64EndOfDirectory::SIGNATURE {
        return Ok(None);
    }
    Ok(Zip64EndOfDirectory::parse(&buf).filter(Zip64EndOfDirectory::is_plausible))
}

/// Locate the end-of-directory record and parse the whole central
/// directory into normalized file headers.
pub(crate) fn read_directory(source: &dyn Source) -> Result<Vec<FileHeader>> {
    let total = source.len();
    let tail_len = total.min(MAX_TAIL_SEARCH);
    let mut tail = vec![0u8; tail_len as usize];
    source.read_at(total - tail_len, &mut tail)?;

    let classic = find_directory_end_at::<EndOfDirectory>(&tail);

    if let Some(record) = zip64_via_locator(source, &tail, classic.as_ref().map(|&(at, _)| at))? {
        return parse_central_directory(source, &record);
    }
    if let Some(record) = find_directory_end::<Zip64EndOfDirectory>(&tail) {
        return parse_central_directory(source, &record);
    }
    if let Some((_, record)) = classic {
        return parse_central_directory(source, &record);
    }
    Err(ZipError::NotAZipArchive)
}

fn parse_central_directory<T: DirectoryEnd>(
    source: &dyn Source,
    end: &T,
) -> Result<Vec<FileHeader>> {
    let size = end.cd_size();
    if size > MAX_DIRECTORY_SIZE {
        return Err(ZipError::DirectoryTooLarge { size });
    }

    let mut buffer = vec![0u8; size as usize];
    source.read_at(end.cd_offset(), &mut buffer)?;

    let count = end.cd_entries();
    let mut headers = Vec::with_capacity(count.min(size / CentralDirectoryHeader::FIXED_SIZE as u64) as usize);

    let mut offset = 0usize;
    for _ in 0..count {
        if offset >= buffer.len() {
            return Err(ZipError::malformed_directory(
                "directory size exhausted before entry count",
            ));
        }
        let cdh = CentralDirectoryHeader::parse(&buffer[offset..])?;
        if cdh.disk_number_start != 0 {
            return Err(ZipError::malformed_directory(
                "split archives are not supported",
            ));
        }
        headers.push(FileHeader::from_central(&cdh)?);
        offset += cdh.total_size();
    }

    // Entry count and directory size must exhaust together
    if offset != buffer.len() {
        return Err(ZipError::malformed_directory(
            "entry count exhausted before directory size",
        ));
    }

    Ok(headers)
}
