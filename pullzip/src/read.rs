//! The per-member read pipeline.
//!
//! Opening a member composes a chain of single-owner layers, each
//! wrapping the previous:
//!
//! 1. raw bounded reads of the compressed payload, after validating
//!    the local file header at the member's recorded offset;
//! 2. ZipCrypto decryption when general purpose bit 0 is set, with
//!    the 12-byte encryption header consumed and checked up front;
//! 3. decompression, dispatched on the compression method;
//! 4. running CRC-32 validation with uncompressed-size accounting.
//!
//! The order mirrors the on-disk semantics: stored bytes are
//! encrypted, decrypted bytes are compressed, decompressed bytes are
//! CRC'd. A fifth layer, the 1 GiB chunker, lives in
//! [`ZipFile::read`](crate::ZipFile::read) so downstream layers only
//! ever see bounded request sizes.

use std::sync::Arc;

use pullzip_core::crc::Crc32;
use pullzip_core::error::{Result, ZipError};
use pullzip_core::source::Source;
use pullzip_core::traits::PullRead;
use pullzip_deflate::InflateReader;

use crate::crypto::{ZipCrypto, ENCRYPTION_HEADER_SIZE};
use crate::header::{CompressionMethod, FileHeader, LocalFileHeader};

/// Bounded reads of a member's compressed bytes from the source.
pub(crate) struct RawReader {
    source: Arc<dyn Source>,
    cursor: u64,
    remain: u64,
}

impl RawReader {
    /// Validate the local file header and position the cursor at the
    /// first payload byte.
    pub(crate) fn open(source: Arc<dyn Source>, header: &FileHeader) -> Result<Self> {
        let offset = header.relative_offset_of_local_header;
        let mut fixed = [0u8; LocalFileHeader::FIXED_SIZE];
        source.read_at(offset, &mut fixed)?;
        let local = LocalFileHeader::parse(&fixed, offset)?;

        Ok(Self {
            source,
            cursor: offset + local.total_size(),
            remain: header.compressed_size,
        })
    }
}

impl PullRead for RawReader {
    fn pull(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = (buf.len() as u64).min(self.remain) as usize;
        if n == 0 {
            return Ok(0);
        }
        self.source.read_at(self.cursor, &mut buf[..n])?;
        self.cursor += n as u64;
        self.remain -= n as u64;
        Ok(n)
    }
}

/// ZipCrypto decryption layer.
pub(crate) struct CryptoReader<R> {
    inner: R,
    cipher: ZipCrypto,
}

impl<R: PullRead> CryptoReader<R> {
    /// Consume and decrypt the 12-byte encryption header, checking its
    /// last byte against the high byte of the member's CRC-32.
    pub(crate) fn open(mut inner: R, password: &[u8], expected_crc: u32) -> Result<Self> {
        let mut cipher = ZipCrypto::new(password);

        let mut header = [0u8; ENCRYPTION_HEADER_SIZE];
        let mut got = 0usize;
        while got < header.len() {
            let n = inner.pull(&mut header[got..])?;
            if n == 0 {
                return Err(ZipError::short_read((header.len() - got) as u64));
            }
            got += n;
        }
        cipher.decrypt_buffer(&mut header);

        if header[ENCRYPTION_HEADER_SIZE - 1] != ZipCrypto::check_byte(expected_crc) {
            return Err(ZipError::BadPassword);
        }

        Ok(Self { inner, cipher })
    }
}

impl<R: PullRead> PullRead for CryptoReader<R> {
    fn pull(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.inner.pull(buf)?;
        self.cipher.decrypt_buffer(&mut buf[..n]);
        Ok(n)
    }
}

/// CRC-32 validation and uncompressed-size accounting layer.
pub(crate) struct CrcReader<R> {
    inner: R,
    crc: Crc32,
    remaining: u64,
    expected: u32,
}

impl<R: PullRead> CrcReader<R> {
    pub(crate) fn new(inner: R, uncompressed_size: u64, expected: u32) -> Self {
        Self {
            inner,
            crc: Crc32::new(),
            remaining: uncompressed_size,
            expected,
        }
    }
}

impl<R: PullRead> PullRead for CrcReader<R> {
    fn pull(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.inner.pull(buf)?;
        if n == 0 && self.remaining > 0 {
            return Err(ZipError::short_read(self.remaining));
        }
        if n as u64 > self.remaining {
            return Err(ZipError::SizeMismatch);
        }

        self.crc.update(&buf[..n]);
        self.remaining -= n as u64;

        if self.remaining == 0 {
            let computed = self.crc.value();
            if computed != self.expected {
                return Err(ZipError::crc_mismatch(self.expected, computed));
            }
        }

        Ok(n)
    }
}

/// Compose the full pull chain for one member.
pub(crate) fn open_member(
    source: Arc<dyn Source>,
    header: &FileHeader,
    password: Option<&[u8]>,
) -> Result<Box<dyn PullRead + Send>> {
    let raw = RawReader::open(source, header)?;

    let decrypted: Box<dyn PullRead + Send> = if header.is_encrypted() {
        Box::new(CryptoReader::open(
            raw,
            password.unwrap_or_default(),
            header.crc_32,
        )?)
    } else {
        Box::new(raw)
    };

    let decompressed: Box<dyn PullRead + Send> = match header.compression_method {
        CompressionMethod::Stored => decrypted,
        CompressionMethod::Deflate => Box::new(InflateReader::new(decrypted)),
        #[cfg(feature = "bzip2")]
        CompressionMethod::Bzip2 => Box::new(crate::bzip2::Bzip2Reader::new(decrypted)),
        #[cfg(not(feature = "bzip2"))]
        CompressionMethod::Bzip2 => {
            return Err(ZipError::unsupported_compression(
                CompressionMethod::Bzip2.as_u16(),
            ))
        }
        CompressionMethod::Unknown(method) => {
            return Err(ZipError::unsupported_compression(method))
        }
    };

    Ok(Box::new(CrcReader::new(
        decompressed,
        header.uncompressed_size,
        header.crc_32,
    )))
}
