//! Horizontal lane-interleaved bitpacking of 128-integer blocks
//!
//! A block is spread over `L` lanes: value `s * L + l` is the `s`-th value of
//! lane `l`. Each lane accumulates its values LSB-first into words of `W::BITS`
//! bits and the lanes' words are stored interleaved, so word `i` belongs to lane
//! `i % L` at position `i / L`. Loading `L` consecutive words fills one 128-bit
//! register with one word per lane, which is why `L * W::BITS == 128`.
//!
//! All lanes advance in lockstep, so a single fill counter is shared by the
//! whole register. The lane arrays below are plain `[W; L]` values; the compiler
//! keeps them in vector registers. Explicit intrinsics live in `simd`.
//!
//! The same loop packs sub-word lanes (see `lane_transform`): with a split
//! narrower than the word, every `S`-bit field is its own cursor stream and the
//! replicated masks from `bit_math` keep shifted bits inside their field.

use super::bit_math;
use super::lane_transform::{LaneSplit, PAIR_COUNT};
use crate::BLOCK_SIZE;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::ops::{BitAnd, BitOr, BitOrAssign, Shl, Shr};

/// Unsigned storage word of a packed block
pub trait Word:
    Copy
    + Default
    + Eq
    + Debug
    + Send
    + Sync
    + 'static
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + BitOrAssign
    + Shl<u32, Output = Self>
    + Shr<u32, Output = Self>
{
    const BITS: u32;
    const ZERO: Self;

    /// Truncating conversion
    fn from_u64(v: u64) -> Self;
    fn to_u64(self) -> u64;
}

impl Word for u32 {
    const BITS: u32 = 32;
    const ZERO: Self = 0;

    #[inline]
    fn from_u64(v: u64) -> Self {
        v as u32
    }

    #[inline]
    fn to_u64(self) -> u64 {
        self as u64
    }
}

impl Word for u64 {
    const BITS: u32 = 64;
    const ZERO: Self = 0;

    #[inline]
    fn from_u64(v: u64) -> Self {
        v
    }

    #[inline]
    fn to_u64(self) -> u64 {
        self
    }
}

/// Receives one register of decoded values per step
pub trait LaneSink<W: Word, const L: usize> {
    fn put(&mut self, step: usize, lanes: [W; L]);
}

/// Writes decoded registers back in order
pub struct SliceSink<'a, W> {
    out: &'a mut [W],
}

impl<'a, W> SliceSink<'a, W> {
    pub fn new(out: &'a mut [W]) -> Self {
        Self { out }
    }
}

impl<W: Word, const L: usize> LaneSink<W, L> for SliceSink<'_, W> {
    #[inline]
    fn put(&mut self, step: usize, lanes: [W; L]) {
        self.out[step * L..(step + 1) * L].copy_from_slice(&lanes);
    }
}

/// Writes value `i` into the high half and value `i + 64` into the low half of `out[i % 64]`
///
/// Steps arrive in ascending order, so every high half is written before its
/// low half is OR'd in.
pub struct PairSink<'a> {
    out: &'a mut [u64; PAIR_COUNT],
}

impl<'a> PairSink<'a> {
    pub fn new(out: &'a mut [u64; PAIR_COUNT]) -> Self {
        Self { out }
    }
}

impl<W: Word, const L: usize> LaneSink<W, L> for PairSink<'_> {
    #[inline]
    fn put(&mut self, step: usize, lanes: [W; L]) {
        for (l, v) in lanes.into_iter().enumerate() {
            let idx = step * L + l;
            if idx < PAIR_COUNT {
                self.out[idx] = v.to_u64() << 32;
            } else {
                self.out[idx - PAIR_COUNT] |= v.to_u64();
            }
        }
    }
}

/// Lane-interleaved packer for `W`-bit words and `L` lanes
pub struct WordPacker<W, const L: usize>(PhantomData<W>);

/// 4 lanes of 32-bit words
pub type Packer32x4 = WordPacker<u32, 4>;
/// 2 lanes of 64-bit words
pub type Packer64x2 = WordPacker<u64, 2>;

#[inline]
fn load<W: Word, const L: usize>(chunk: &[W]) -> [W; L] {
    let mut register = [W::ZERO; L];
    register.copy_from_slice(chunk);
    register
}

impl<W: Word, const L: usize> WordPacker<W, L> {
    const REGISTER_CHECK: () = assert!(
        L * W::BITS as usize == 128,
        "lanes must fill one 128-bit register"
    );

    /// Words emitted for one block of `bits`-wide values
    #[inline]
    pub const fn word_count(bits: u32) -> usize {
        BLOCK_SIZE * bits as usize / W::BITS as usize
    }

    /// Pack one block
    ///
    /// `values` holds the 128 natural-order values for `LaneSplit::Whole`, or the
    /// `128 / G` collapsed words otherwise. Values are masked to `bits`; `out`
    /// must hold exactly [`Self::word_count`] words and is fully overwritten.
    pub fn pack(values: &[W], bits: u32, split: LaneSplit, out: &mut [W]) {
        let () = Self::REGISTER_CHECK;
        let sub = split.sub_bits(W::BITS);
        debug_assert!(bits >= 1 && bits <= sub && bits < W::BITS);
        debug_assert_eq!(values.len(), split.collapsed_len(W::BITS));
        debug_assert_eq!(out.len(), Self::word_count(bits));

        let value_mask = W::from_u64(bit_math::sub_mask(sub, bits));
        let mut acc = [W::ZERO; L];
        let mut filled = 0u32;
        let mut pos = 0usize;

        for chunk in values.chunks_exact(L) {
            // bits of each field still free in the current word
            let room = W::from_u64(bit_math::sub_mask(sub, sub - filled));
            for (a, &x) in acc.iter_mut().zip(chunk) {
                *a |= (x & value_mask & room) << filled;
            }
            filled += bits;

            if filled >= sub {
                out[pos..pos + L].copy_from_slice(&acc);
                pos += L;
                // high `rem` bits of each value seed the next word
                let rem = filled - sub;
                let keep = W::from_u64(bit_math::sub_mask(sub, rem));
                for (a, &x) in acc.iter_mut().zip(chunk) {
                    *a = ((x & value_mask) >> (bits - rem)) & keep;
                }
                filled = rem;
            }
        }

        debug_assert_eq!(filled, 0);
        debug_assert_eq!(pos, out.len());
    }

    /// Unpack one block into `out` (natural order, or collapsed words for a narrow split)
    pub fn unpack(words: &[W], bits: u32, split: LaneSplit, out: &mut [W]) {
        debug_assert_eq!(out.len(), split.collapsed_len(W::BITS));
        Self::unpack_into(words, bits, split, &mut SliceSink::new(out));
    }

    /// Unpack one block, handing each decoded register to `sink`
    pub fn unpack_into<S: LaneSink<W, L>>(words: &[W], bits: u32, split: LaneSplit, sink: &mut S) {
        let () = Self::REGISTER_CHECK;
        let sub = split.sub_bits(W::BITS);
        debug_assert!(bits >= 1 && bits <= sub && bits < W::BITS);
        debug_assert_eq!(words.len(), Self::word_count(bits));

        let steps = split.collapsed_len(W::BITS) / L;
        let value_mask = W::from_u64(bit_math::sub_mask(sub, bits));
        let mut registers = words.chunks_exact(L);
        let mut cur: [W; L] = match registers.next() {
            Some(chunk) => load(chunk),
            None => return,
        };
        let mut consumed = 0u32;

        for step in 0..steps {
            let own = W::from_u64(bit_math::sub_mask(sub, sub - consumed));
            let mut lanes = [W::ZERO; L];
            for (v, &c) in lanes.iter_mut().zip(&cur) {
                *v = (c >> consumed) & own;
            }
            consumed += bits;

            if consumed >= sub {
                let rem = consumed - sub;
                if let Some(chunk) = registers.next() {
                    let next: [W; L] = load(chunk);
                    // the value straddles two words: its top `rem` bits sit at the bottom of `next`
                    let low = W::from_u64(bit_math::sub_mask(sub, rem));
                    for (v, &n) in lanes.iter_mut().zip(&next) {
                        *v |= (n & low) << (bits - rem);
                    }
                    cur = next;
                }
                consumed = rem;
            }

            for v in lanes.iter_mut() {
                *v = *v & value_mask;
            }
            sink.put(step, lanes);
        }
    }
}
