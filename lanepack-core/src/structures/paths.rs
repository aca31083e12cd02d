//! Specialized paths: bit width dispatch and the public block codec
//!
//! Every bit width 1..=31 maps to a [`Route`]: the kernel that runs it and the
//! lane split of the 64-bit layout. All kernels emit the same words for the
//! same `(bits, W)`, so a block packed by one route decodes with any other.
//!
//! Kernel selection:
//! - **Reference**: scalar `ReferenceCodec`, no transpose pass
//! - **Portable**: `WordPacker` lane arrays, plus `collapse`/`expand` for narrow 64-bit widths
//! - **Simd**: explicit SSE2/NEON registers, same transforms as Portable

use super::bit_math;
use super::lane_transform::{self, LaneSplit, PAIR_COUNT};
use super::reference::ReferenceCodec;
use super::simd;
use super::word_io::WordIo;
use super::word_packer::{PairSink, Packer32x4, Packer64x2, Word};
use crate::config::CodecConfig;
use crate::error::{Error, Result, check_len};
use crate::{BLOCK_SIZE, MAX_BITS, MIN_BITS};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::OnceLock;

/// Implementation that runs a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kernel {
    Reference,
    Portable,
    Simd,
}

/// Dispatch decision for one bit width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub kernel: Kernel,
    pub split: LaneSplit,
}

/// Check that `bits` is a supported width
#[inline]
pub fn validate_bits(bits: u8) -> Result<u32> {
    if (MIN_BITS..=MAX_BITS).contains(&bits) {
        Ok(bits as u32)
    } else {
        Err(Error::InvalidBitWidth(bits))
    }
}

/// Routes for every supported bit width of one word type
#[derive(Debug, Clone)]
pub struct DispatchTable {
    word_bits: u32,
    routes: [Route; MAX_BITS as usize],
}

impl DispatchTable {
    pub fn new(word_bits: u32, kernel: Kernel) -> Self {
        let routes = std::array::from_fn(|i| Route {
            kernel,
            split: LaneSplit::for_bits(word_bits, i as u32 + 1),
        });
        Self { word_bits, routes }
    }

    pub fn word_bits(&self) -> u32 {
        self.word_bits
    }

    #[inline]
    pub fn route(&self, bits: u8) -> Result<Route> {
        validate_bits(bits)?;
        Ok(self.routes[bits as usize - 1])
    }
}

/// Word types with a full set of block kernels
///
/// Callers pass validated widths and exactly sized buffers.
pub trait PackWord: WordIo {
    fn pack_lanes(values: &[Self; BLOCK_SIZE], bits: u32, route: Route, out: &mut [Self]);
    fn unpack_lanes(words: &[Self], bits: u32, route: Route, out: &mut [Self; BLOCK_SIZE]);
    fn unpack_lanes_to_pairs(
        words: &[Self],
        bits: u32,
        route: Route,
        out: &mut [u64; PAIR_COUNT],
    );
}

impl PackWord for u32 {
    fn pack_lanes(values: &[u32; BLOCK_SIZE], bits: u32, route: Route, out: &mut [u32]) {
        match route.kernel {
            Kernel::Reference => ReferenceCodec::pack(values, bits, out),
            Kernel::Portable => Packer32x4::pack(values, bits, LaneSplit::Whole, out),
            Kernel::Simd => simd::pack_4x32(values, bits, out),
        }
    }

    fn unpack_lanes(words: &[u32], bits: u32, route: Route, out: &mut [u32; BLOCK_SIZE]) {
        match route.kernel {
            Kernel::Reference => ReferenceCodec::unpack(words, bits, out),
            Kernel::Portable => Packer32x4::unpack(words, bits, LaneSplit::Whole, out),
            Kernel::Simd => simd::unpack_4x32(words, bits, out),
        }
    }

    fn unpack_lanes_to_pairs(
        words: &[u32],
        bits: u32,
        route: Route,
        out: &mut [u64; PAIR_COUNT],
    ) {
        if route.kernel == Kernel::Portable {
            Packer32x4::unpack_into(words, bits, LaneSplit::Whole, &mut PairSink::new(out));
            return;
        }
        let mut values = [0u32; BLOCK_SIZE];
        Self::unpack_lanes(words, bits, route, &mut values);
        lane_transform::collapse(&values, LaneSplit::Words, out);
    }
}

impl PackWord for u64 {
    fn pack_lanes(values: &[u64; BLOCK_SIZE], bits: u32, route: Route, out: &mut [u64]) {
        if route.kernel == Kernel::Reference {
            ReferenceCodec::pack(values, bits, out);
            return;
        }

        let mut scratch = [0u64; BLOCK_SIZE];
        let lanes: &[u64] = if route.split == LaneSplit::Whole {
            &values[..]
        } else {
            let n = route.split.collapsed_len(64);
            lane_transform::collapse(values, route.split, &mut scratch[..n]);
            &scratch[..n]
        };

        match route.kernel {
            Kernel::Simd => simd::pack_2x64(lanes, bits, route.split, out),
            _ => Packer64x2::pack(lanes, bits, route.split, out),
        }
    }

    fn unpack_lanes(words: &[u64], bits: u32, route: Route, out: &mut [u64; BLOCK_SIZE]) {
        match (route.kernel, route.split) {
            (Kernel::Reference, _) => ReferenceCodec::unpack(words, bits, out),
            (Kernel::Portable, LaneSplit::Whole) => {
                Packer64x2::unpack(words, bits, LaneSplit::Whole, out)
            }
            (Kernel::Simd, LaneSplit::Whole) => {
                simd::unpack_2x64(words, bits, LaneSplit::Whole, out)
            }
            (kernel, split) => {
                let mut collapsed = [0u64; BLOCK_SIZE];
                let n = decode_collapsed(words, bits, kernel, split, &mut collapsed);
                lane_transform::expand(&collapsed[..n], split, out);
            }
        }
    }

    fn unpack_lanes_to_pairs(
        words: &[u64],
        bits: u32,
        route: Route,
        out: &mut [u64; PAIR_COUNT],
    ) {
        match (route.kernel, route.split) {
            (Kernel::Reference, _) => {
                let mut values = [0u64; BLOCK_SIZE];
                ReferenceCodec::unpack(words, bits, &mut values);
                lane_transform::collapse(&values, LaneSplit::Words, out);
            }
            (Kernel::Portable, LaneSplit::Whole) => {
                Packer64x2::unpack_into(words, bits, LaneSplit::Whole, &mut PairSink::new(out));
            }
            (kernel, split) => {
                let mut collapsed = [0u64; BLOCK_SIZE];
                let n = decode_collapsed(words, bits, kernel, split, &mut collapsed);
                lane_transform::widen_to_pairs(&collapsed[..n], split, out);
            }
        }
    }
}

/// Decode the collapsed (or natural, for `Whole`) words of a 64-bit block
fn decode_collapsed(
    words: &[u64],
    bits: u32,
    kernel: Kernel,
    split: LaneSplit,
    out: &mut [u64; BLOCK_SIZE],
) -> usize {
    let n = split.collapsed_len(64);
    match kernel {
        Kernel::Simd => simd::unpack_2x64(words, bits, split, &mut out[..n]),
        _ => Packer64x2::unpack(words, bits, split, &mut out[..n]),
    }
    n
}

/// Packed payload of one block in a fixed-capacity buffer
#[derive(Clone, Copy)]
pub struct PackedWords<W> {
    words: [W; BLOCK_SIZE],
    len: usize,
}

impl<W: Word> PackedWords<W> {
    pub(crate) fn from_parts(words: [W; BLOCK_SIZE], len: usize) -> Self {
        debug_assert!(len <= BLOCK_SIZE);
        Self { words, len }
    }

    pub fn as_slice(&self) -> &[W] {
        &self.words[..self.len]
    }
}

impl<W: Word> Deref for PackedWords<W> {
    type Target = [W];

    fn deref(&self) -> &[W] {
        self.as_slice()
    }
}

impl<W: Word> std::fmt::Debug for PackedWords<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<W: Word> PartialEq for PackedWords<W> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<W: Word> Eq for PackedWords<W> {}

/// Block codec for one word type
///
/// Holds nothing but its dispatch table, so one packer can be shared by any
/// number of threads.
#[derive(Debug, Clone)]
pub struct BitPacker<W> {
    table: DispatchTable,
    check_values: bool,
    _word: PhantomData<W>,
}

/// 32-bit words, 4 lanes
pub type BitPacker32 = BitPacker<u32>;
/// 64-bit words, 2 lanes
pub type BitPacker64 = BitPacker<u64>;

impl<W: PackWord> BitPacker<W> {
    pub fn new(config: &CodecConfig) -> Self {
        let kernel = config.kernel.resolve();
        debug!(
            "Building {}-bit dispatch table: kernel={:?}, simd_available={}, check_values={}",
            W::BITS,
            kernel,
            simd::is_available(),
            config.check_values
        );
        Self {
            table: DispatchTable::new(W::BITS, kernel),
            check_values: config.check_values,
            _word: PhantomData,
        }
    }

    /// Packer pinned to one kernel, without value checks
    pub fn with_kernel(kernel: Kernel) -> Self {
        Self {
            table: DispatchTable::new(W::BITS, kernel),
            check_values: false,
            _word: PhantomData,
        }
    }

    /// Words emitted for one block of `bits`-wide values
    #[inline]
    pub const fn word_count(bits: u8) -> usize {
        BLOCK_SIZE * bits as usize / W::BITS as usize
    }

    pub fn route(&self, bits: u8) -> Result<Route> {
        self.table.route(bits)
    }

    /// Pack `values` into `out`, which must hold exactly `word_count(bits)` words
    ///
    /// Values are masked to `bits`. With `check_values` set, an oversized value
    /// is reported instead and `out` is left untouched.
    pub fn pack(&self, values: &[W; BLOCK_SIZE], bits: u8, out: &mut [W]) -> Result<()> {
        let route = self.table.route(bits)?;
        check_len("packed words", Self::word_count(bits), out.len())?;
        let limit = bit_math::low_mask(bits as u32);
        if self.check_values {
            if let Some(index) = values.iter().position(|v| v.to_u64() > limit) {
                return Err(Error::ValueOutOfRange {
                    index,
                    value: values[index].to_u64(),
                    bits,
                });
            }
        }
        debug_assert!(
            values.iter().all(|v| v.to_u64() <= limit),
            "value does not fit in {} bits",
            bits
        );

        W::pack_lanes(values, bits as u32, route, out);
        Ok(())
    }

    /// Pack into a stack buffer
    pub fn pack_block(&self, values: &[W; BLOCK_SIZE], bits: u8) -> Result<PackedWords<W>> {
        let mut words = [W::ZERO; BLOCK_SIZE];
        let len = Self::word_count(bits);
        self.pack(values, bits, &mut words[..len.min(BLOCK_SIZE)])?;
        Ok(PackedWords::from_parts(words, len))
    }

    /// Unpack exactly `word_count(bits)` words into 128 values
    pub fn unpack(&self, words: &[W], bits: u8, out: &mut [W; BLOCK_SIZE]) -> Result<()> {
        let route = self.table.route(bits)?;
        check_len("packed words", Self::word_count(bits), words.len())?;
        W::unpack_lanes(words, bits as u32, route, out);
        Ok(())
    }

    /// Unpack with value `i` in the high 32 bits and value `i + 64` in the low 32 bits of `out[i]`
    pub fn unpack_interleaved_pairs(
        &self,
        words: &[W],
        bits: u8,
        out: &mut [u64; PAIR_COUNT],
    ) -> Result<()> {
        let route = self.table.route(bits)?;
        check_len("packed words", Self::word_count(bits), words.len())?;
        W::unpack_lanes_to_pairs(words, bits as u32, route, out);
        Ok(())
    }
}

fn default_config() -> CodecConfig {
    CodecConfig::from_env().unwrap_or_else(|e| {
        warn!("Ignoring invalid codec environment: {}", e);
        CodecConfig::default()
    })
}

/// Shared 32-bit packer configured from the environment
pub fn default_packer32() -> &'static BitPacker32 {
    static PACKER: OnceLock<BitPacker32> = OnceLock::new();
    PACKER.get_or_init(|| BitPacker::new(&default_config()))
}

/// Shared 64-bit packer configured from the environment
pub fn default_packer64() -> &'static BitPacker64 {
    static PACKER: OnceLock<BitPacker64> = OnceLock::new();
    PACKER.get_or_init(|| BitPacker::new(&default_config()))
}

pub fn pack32(values: &[u32; BLOCK_SIZE], bits: u8, out: &mut [u32]) -> Result<()> {
    default_packer32().pack(values, bits, out)
}

pub fn unpack32(words: &[u32], bits: u8, out: &mut [u32; BLOCK_SIZE]) -> Result<()> {
    default_packer32().unpack(words, bits, out)
}

pub fn unpack_interleaved_pairs32(
    words: &[u32],
    bits: u8,
    out: &mut [u64; PAIR_COUNT],
) -> Result<()> {
    default_packer32().unpack_interleaved_pairs(words, bits, out)
}

pub fn pack64(values: &[u64; BLOCK_SIZE], bits: u8, out: &mut [u64]) -> Result<()> {
    default_packer64().pack(values, bits, out)
}

pub fn unpack64(words: &[u64], bits: u8, out: &mut [u64; BLOCK_SIZE]) -> Result<()> {
    default_packer64().unpack(words, bits, out)
}

pub fn unpack_interleaved_pairs64(
    words: &[u64],
    bits: u8,
    out: &mut [u64; PAIR_COUNT],
) -> Result<()> {
    default_packer64().unpack_interleaved_pairs(words, bits, out)
}
