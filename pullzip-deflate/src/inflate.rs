//! DEFLATE block decoding (RFC 1951).
//!
//! [`InflateStream`] is a resumable state machine producing piecewise
//! uncompressed spans of up to ~65 000 bytes; [`InflateReader`] is the
//! thin byte-oriented adapter over it that the member read pipeline
//! plugs in. Huffman decoders are rebuilt per block and the previous
//! block's tables are dropped on replacement.

use pullzip_core::bitstream::BitReader;
use pullzip_core::error::{Result, ZipError};
use pullzip_core::traits::PullRead;
use pullzip_core::window::Window;

use crate::huffman::HuffmanDecoder;
use crate::tables::{
    fixed_distance_lengths, fixed_literal_lengths, CODE_LENGTH_ORDER, CODE_LENGTH_SYMBOLS,
    DISTANCE_BASE, DISTANCE_EXTRA_BITS, DISTANCE_SYMBOLS, END_OF_BLOCK, LENGTH_BASE,
    LENGTH_EXTRA_BITS, LITERAL_SYMBOLS,
};

/// A produced span is cut off once it reaches this size.
const SPAN_LIMIT: usize = 65000;

/// DEFLATE's semantic history bound; the window itself is larger.
const MAX_DISTANCE: usize = 32768;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    BlockHead,
    CompressedBlock,
    CompressedLastBlock,
    End,
}

/// The block-producing DEFLATE decoder core.
#[derive(Debug)]
pub struct InflateStream<R> {
    input: BitReader<R>,
    window: Window,
    literal_decoder: HuffmanDecoder,
    distance_decoder: HuffmanDecoder,
    state: State,
    output: Vec<u8>,
}

impl<R: PullRead> InflateStream<R> {
    /// Create a decoder pulling compressed bytes from `upstream`.
    pub fn new(upstream: R) -> Self {
        Self {
            input: BitReader::new(upstream),
            window: Window::new(),
            literal_decoder: HuffmanDecoder::new(&[]),
            distance_decoder: HuffmanDecoder::new(&[]),
            state: State::BlockHead,
            output: Vec::with_capacity(65536),
        }
    }

    /// Whether the final block has been fully decoded.
    pub fn is_finished(&self) -> bool {
        self.state == State::End
    }

    /// The span produced by the last [`advance`](Self::advance).
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Produce the next uncompressed span into [`output`](Self::output).
    ///
    /// An empty span after `advance` means end of stream.
    pub fn advance(&mut self) -> Result<()> {
        self.output.clear();

        loop {
            match self.state {
                State::BlockHead => {
                    let bfinal = self.input.read_bits(1)? != 0;
                    let btype = self.input.read_bits(2)?;

                    match btype {
                        0b00 => {
                            self.stored_block(bfinal)?;
                            if !self.output.is_empty() || self.state == State::End {
                                return Ok(());
                            }
                        }
                        0b01 | 0b10 => {
                            let (literal, distance) = if btype == 0b01 {
                                fixed_decoders()
                            } else {
                                dynamic_decoders(&mut self.input)?
                            };
                            self.literal_decoder = literal;
                            self.distance_decoder = distance;
                            self.state = if bfinal {
                                State::CompressedLastBlock
                            } else {
                                State::CompressedBlock
                            };
                        }
                        btype => return Err(ZipError::InvalidBlockType { btype: btype as u8 }),
                    }
                }

                State::CompressedBlock | State::CompressedLastBlock => {
                    if self.compressed_block()? {
                        return Ok(());
                    }
                }

                State::End => return Ok(()), // empty
            }
        }
    }

    /// Non-compressed block: byte-aligned LEN/NLEN then raw bytes,
    /// still routed through the window so later back-references see
    /// them.
    fn stored_block(&mut self, bfinal: bool) -> Result<()> {
        self.input.align_to_byte()?;
        let len = self.input.read_bits(16)?;
        let nlen = self.input.read_bits(16)?;
        if len ^ nlen != 0xFFFF {
            return Err(ZipError::InvalidStoredBlock);
        }

        for _ in 0..len {
            let byte = self.input.read_bits(8)? as u8;
            self.output.push(self.window.put(byte));
        }

        self.state = if bfinal { State::End } else { State::BlockHead };
        Ok(())
    }

    /// Decode literal/length symbols until end-of-block or the span
    /// limit. Returns whether a span is ready to yield.
    fn compressed_block(&mut self) -> Result<bool> {
        loop {
            self.input.fill(32)?;
            let symbol = self.literal_decoder.decode(&mut self.input)?;

            if symbol < 256 {
                self.output.push(self.window.put(symbol as u8));
            } else if symbol == END_OF_BLOCK {
                self.state = if self.state == State::CompressedLastBlock {
                    State::End
                } else {
                    State::BlockHead
                };
                return Ok(!self.output.is_empty() || self.state == State::End);
            } else if symbol <= 285 {
                let index = (symbol - 257) as usize;
                let length = LENGTH_BASE[index] as usize
                    + self.input.read_bits(LENGTH_EXTRA_BITS[index] as u32)? as usize;

                let distance_symbol = self.distance_decoder.decode(&mut self.input)?;
                if distance_symbol >= 30 {
                    return Err(ZipError::invalid_alphabet(distance_symbol));
                }
                let index = distance_symbol as usize;
                let distance = DISTANCE_BASE[index] as usize
                    + self.input.read_bits(DISTANCE_EXTRA_BITS[index] as u32)? as usize;

                let available = self.window.cursor().min(MAX_DISTANCE);
                if distance > available {
                    return Err(ZipError::invalid_distance(distance, available));
                }

                // max 258 bytes
                for _ in 0..length {
                    self.output.push(self.window.reput(distance));
                }
            } else {
                return Err(ZipError::invalid_alphabet(symbol));
            }

            if self.output.len() >= SPAN_LIMIT {
                return Ok(true);
            }
        }
    }
}

/// Build the fixed literal/length and distance decoders of a
/// BTYPE=01 block (RFC 1951 Section 3.2.6).
fn fixed_decoders() -> (HuffmanDecoder, HuffmanDecoder) {
    (
        HuffmanDecoder::new(&fixed_literal_lengths()),
        HuffmanDecoder::new(&fixed_distance_lengths()),
    )
}

/// Read the dynamic code description of a BTYPE=10 block and build
/// its decoders (RFC 1951 Section 3.2.7).
fn dynamic_decoders<R: PullRead>(
    input: &mut BitReader<R>,
) -> Result<(HuffmanDecoder, HuffmanDecoder)> {
    let hlit = input.read_bits(5)? as usize + 257;
    let hdist = input.read_bits(5)? as usize + 1;
    let hclen = input.read_bits(4)? as usize + 4;
    if hlit > LITERAL_SYMBOLS {
        return Err(ZipError::invalid_code_lengths("HLIT out of range"));
    }
    if hdist > DISTANCE_SYMBOLS {
        return Err(ZipError::invalid_code_lengths("HDIST out of range"));
    }
    if hclen > CODE_LENGTH_SYMBOLS {
        return Err(ZipError::invalid_code_lengths("HCLEN out of range"));
    }

    let mut code_length_lengths = [0u8; CODE_LENGTH_SYMBOLS];
    for &position in CODE_LENGTH_ORDER.iter().take(hclen) {
        code_length_lengths[position] = input.read_bits(3)? as u8;
    }
    let length_decoder = HuffmanDecoder::new(&code_length_lengths);

    // Literal/length and distance code lengths form one sequence;
    // repeat codes may run across the split at HLIT.
    let mut lengths = vec![0u8; hlit + hdist];
    let mut filled = 0usize;
    while filled < lengths.len() {
        let code = length_decoder.decode(input)?;
        match code {
            0..=15 => {
                lengths[filled] = code as u8;
                filled += 1;
            }
            16 => {
                if filled == 0 {
                    return Err(ZipError::invalid_code_lengths(
                        "repeat code with no previous length",
                    ));
                }
                let repeat = input.read_bits(2)? as usize + 3;
                let previous = lengths[filled - 1];
                if filled + repeat > lengths.len() {
                    return Err(ZipError::invalid_code_lengths("repeat run past table end"));
                }
                lengths[filled..filled + repeat].fill(previous);
                filled += repeat;
            }
            17 => {
                let repeat = input.read_bits(3)? as usize + 3;
                if filled + repeat > lengths.len() {
                    return Err(ZipError::invalid_code_lengths("zero run past table end"));
                }
                filled += repeat;
            }
            18 => {
                let repeat = input.read_bits(7)? as usize + 11;
                if filled + repeat > lengths.len() {
                    return Err(ZipError::invalid_code_lengths("zero run past table end"));
                }
                filled += repeat;
            }
            code => return Err(ZipError::invalid_alphabet(code)),
        }
    }

    Ok((
        HuffmanDecoder::new(&lengths[..hlit]),
        HuffmanDecoder::new(&lengths[hlit..]),
    ))
}

/// Byte-oriented adapter over [`InflateStream`].
///
/// Copies from the current span into the caller's buffer, pulling the
/// next span when the current one drains.
#[derive(Debug)]
pub struct InflateReader<R> {
    stream: InflateStream<R>,
    position: usize,
    done: bool,
}

impl<R: PullRead> InflateReader<R> {
    /// Create a reader decoding the DEFLATE stream from `upstream`.
    pub fn new(upstream: R) -> Self {
        Self {
            stream: InflateStream::new(upstream),
            position: 0,
            done: false,
        }
    }
}

impl<R: PullRead> PullRead for InflateReader<R> {
    fn pull(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            if self.position == self.stream.output().len() {
                if self.done {
                    break;
                }
                self.stream.advance()?;
                self.position = 0;
                if self.stream.output().is_empty() {
                    self.done = true;
                    break;
                }
            }
            let span = &self.stream.output()[self.position..];
            let n = span.len().min(buf.len() - total);
            buf[total..total + n].copy_from_slice(&span[..n]);
            self.position += n;
            total += n;
        }
        Ok(total)
    }
}

/// Decompress a complete in-memory DEFLATE stream.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut reader = InflateReader::new(data);
    let mut out = Vec::new();
    let mut chunk = [0u8; 65536];
    loop {
        let n = reader.pull(&mut chunk)?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&chunk[..n]);
    }
    Ok(out)
}
