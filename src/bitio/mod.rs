//! Bit-granular code stream I/O.
//!
//! Codewords are variable-length and bit-packed MSB-first within each
//! byte. [`BitSink`] is the growable write side; [`BitSource`] is the
//! matching cursor for decoding. Both are thin wrappers over
//! `bitstream-io` that add the conventions the code stream needs: a bit
//! counter, zero padding to a whole number of output words, and a
//! length-limited unary read.

use std::io;

use bitstream_io::{BigEndian, BitRead, BitReader, BitWrite, BitWriter};

use crate::error::{HyperspecError, Result};

/// Growable MSB-first bit buffer for the compressed stream.
pub struct BitSink {
    writer: BitWriter<Vec<u8>, BigEndian>,
    bit_count: u64,
}

impl BitSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self {
            writer: BitWriter::new(Vec::new()),
            bit_count: 0,
        }
    }

    /// Append a single bit.
    pub fn push_bit(&mut self, bit: bool) -> Result<()> {
        self.writer.write_bit(bit)?;
        self.bit_count += 1;
        Ok(())
    }

    /// Append `len` copies of `bit` (unary prefixes).
    pub fn push_run(&mut self, bit: bool, len: u32) -> Result<()> {
        for _ in 0..len {
            self.writer.write_bit(bit)?;
        }
        self.bit_count += u64::from(len);
        Ok(())
    }

    /// Append the low `width` bits of `value`, most significant first.
    ///
    /// `value` must fit in `width` bits.
    pub fn push_bits(&mut self, value: u64, width: u32) -> Result<()> {
        debug_assert!(width == 64 || value < (1u64 << width));
        self.writer.write(width, value)?;
        self.bit_count += u64::from(width);
        Ok(())
    }

    /// Number of bits appended so far.
    pub fn bit_count(&self) -> u64 {
        self.bit_count
    }

    /// Consume the sink, zero-padding to a whole number of `word_size`-byte
    /// output words.
    pub fn finish(mut self, word_size: u32) -> Result<Vec<u8>> {
        self.writer.byte_align()?;
        let mut bytes = self.writer.into_writer();
        let word = word_size.max(1) as usize;
        while bytes.len() % word != 0 {
            bytes.push(0);
        }
        Ok(bytes)
    }
}

impl Default for BitSink {
    fn default() -> Self {
        Self::new()
    }
}

/// MSB-first bit cursor over a compressed stream.
pub struct BitSource<'a> {
    reader: BitReader<&'a [u8], BigEndian>,
    bit_pos: u64,
}

impl<'a> BitSource<'a> {
    /// Create a cursor over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            reader: BitReader::new(data),
            bit_pos: 0,
        }
    }

    /// Read a single bit.
    pub fn read_bit(&mut self) -> Result<bool> {
        let bit = self.reader.read_bit().map_err(map_exhausted)?;
        self.bit_pos += 1;
        Ok(bit)
    }

    /// Read `width` bits as an unsigned value, most significant first.
    pub fn read_bits(&mut self, width: u32) -> Result<u64> {
        let value = self.reader.read::<u64>(width).map_err(map_exhausted)?;
        self.bit_pos += u64::from(width);
        Ok(value)
    }

    /// Read a run of one-bits terminated by a zero-bit, returning the run
    /// length. The terminating zero is consumed.
    ///
    /// A run longer than `limit` is malformed: the coder never emits more
    /// than `limit` ones before the terminator.
    pub fn read_unary(&mut self, limit: u32) -> Result<u32> {
        let mut count = 0u32;
        while self.read_bit()? {
            count += 1;
            if count > limit {
                return Err(HyperspecError::OversizedUnary(format!(
                    "more than {} consecutive one-bits at bit {}",
                    limit, self.bit_pos
                )));
            }
        }
        Ok(count)
    }

    /// Number of bits consumed so far.
    pub fn bit_pos(&self) -> u64 {
        self.bit_pos
    }
}

fn map_exhausted(err: io::Error) -> HyperspecError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        HyperspecError::TruncatedStream("input exhausted mid-codeword".into())
    } else {
        HyperspecError::Io(err)
    }
}
