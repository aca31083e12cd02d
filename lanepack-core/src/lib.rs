//! Lanepack - lane-interleaved bitpacking for blocks of 128 integers
//!
//! A frame-of-reference codec for posting-list style data: every block of 128
//! unsigned integers is packed at one caller-chosen bit width (1..=31) into
//! `128 * bits / W` words with no header. This library provides:
//! - A lane-interleaved layout for 32-bit words (4 lanes) and 64-bit words (2 lanes)
//! - Byte and halfword sub-lanes for narrow 64-bit widths
//! - A scalar reference codec, portable lane kernels and SSE2/NEON kernels,
//!   all producing identical words
//! - Fused decoding into interleaved `u64` pairs
//!
//! The bit width and the word count are never stored; framing belongs to the
//! container that holds the blocks.

pub mod config;
pub mod error;
pub mod structures;

pub use config::{CodecConfig, KernelPreference};
pub use error::{Error, Result};

// Re-exports from structures
pub use structures::{
    BitPacker, BitPacker32, BitPacker64, Kernel, LaneSplit, PackedWords, ReferenceCodec, Route,
    pack32, pack64, read_block, read_words, unpack_interleaved_pairs32, unpack_interleaved_pairs64,
    unpack32, unpack64, write_words,
};

/// Values per block
pub const BLOCK_SIZE: usize = 128;

/// Narrowest supported bit width
pub const MIN_BITS: u8 = 1;

/// Widest supported bit width
pub const MAX_BITS: u8 = 31;
