//! Little-endian word I/O for packed blocks
//!
//! Packed blocks carry no header: the caller knows the bit width and hence the
//! word count. These helpers write and read exactly the words given.

use super::paths::{PackedWords, validate_bits};
use super::word_packer::Word;
use crate::BLOCK_SIZE;
use crate::error::Result;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// A word type with a little-endian byte encoding
pub trait WordIo: Word {
    fn write_le<Wr: Write>(words: &[Self], writer: &mut Wr) -> io::Result<()>;
    fn read_le<R: Read>(reader: &mut R, out: &mut [Self]) -> io::Result<()>;
}

impl WordIo for u32 {
    fn write_le<Wr: Write>(words: &[Self], writer: &mut Wr) -> io::Result<()> {
        for &w in words {
            writer.write_u32::<LittleEndian>(w)?;
        }
        Ok(())
    }

    fn read_le<R: Read>(reader: &mut R, out: &mut [Self]) -> io::Result<()> {
        reader.read_u32_into::<LittleEndian>(out)
    }
}

impl WordIo for u64 {
    fn write_le<Wr: Write>(words: &[Self], writer: &mut Wr) -> io::Result<()> {
        for &w in words {
            writer.write_u64::<LittleEndian>(w)?;
        }
        Ok(())
    }

    fn read_le<R: Read>(reader: &mut R, out: &mut [Self]) -> io::Result<()> {
        reader.read_u64_into::<LittleEndian>(out)
    }
}

/// Write `words` little-endian, returning the number of bytes written
pub fn write_words<W: WordIo, Wr: Write>(words: &[W], writer: &mut Wr) -> Result<usize> {
    W::write_le(words, writer)?;
    Ok(words.len() * (W::BITS as usize / 8))
}

/// Fill `out` with little-endian words from `reader`
pub fn read_words<W: WordIo, R: Read>(reader: &mut R, out: &mut [W]) -> Result<()> {
    W::read_le(reader, out)?;
    Ok(())
}

/// Read the payload of one block packed at `bits`
pub fn read_block<W: WordIo, R: Read>(reader: &mut R, bits: u8) -> Result<PackedWords<W>> {
    let bits = validate_bits(bits)?;
    let len = BLOCK_SIZE * bits as usize / W::BITS as usize;
    let mut words = [W::ZERO; BLOCK_SIZE];
    W::read_le(reader, &mut words[..len])?;
    Ok(PackedWords::from_parts(words, len))
}
