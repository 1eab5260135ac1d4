//! BZIP2 decompression layer (feature `bzip2`).
//!
//! Method 12 is backed by an out-of-band decoder, the `bzip2` crate,
//! driven through the same pull contract as the built-in DEFLATE
//! path. Input is staged through a 256 KiB buffer.

use bzip2::{Decompress, Status};

use pullzip_core::error::{Result, ZipError};
use pullzip_core::traits::PullRead;

const INPUT_BUFFER_SIZE: usize = 262144;

/// Streaming BZIP2 decoder over an inner pull layer.
pub(crate) struct Bzip2Reader<R> {
    inner: R,
    decompress: Decompress,
    buffer: Vec<u8>,
    position: usize,
    length: usize,
    done: bool,
}

impl<R: PullRead> Bzip2Reader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner,
            decompress: Decompress::new(false),
            buffer: vec![0; INPUT_BUFFER_SIZE],
            position: 0,
            length: 0,
            done: false,
        }
    }
}

impl<R: PullRead> PullRead for Bzip2Reader<R> {
    fn pull(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.done || buf.is_empty() {
            return Ok(0);
        }

        let mut written = 0usize;
        while written == 0 {
            if self.position == self.length {
                let n = self.inner.pull(&mut self.buffer)?;
                if n == 0 {
                    // Truncated stream; the CRC layer reports the
                    // missing bytes.
                    break;
                }
                self.position = 0;
                self.length = n;
            }

            let consumed_before = self.decompress.total_in();
            let produced_before = self.decompress.total_out();
            let status = self
                .decompress
                .decompress(&self.buffer[self.position..self.length], buf)
                .map_err(|err| ZipError::invalid_bzip2_stream(err.to_string()))?;
            self.position += (self.decompress.total_in() - consumed_before) as usize;
            written += (self.decompress.total_out() - produced_before) as usize;

            if matches!(status, Status::StreamEnd) {
                self.done = true;
                break;
            }
        }

        Ok(written)
    }
}
