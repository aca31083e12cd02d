//! Scalar reference codec
//!
//! Walks one sub-lane at a time with a single `(word, filled)` cursor and
//! computes every index directly, so it needs neither lane registers nor a
//! separate transpose pass. It is the correctness oracle for the lane kernels
//! and the portable fallback; its output is bit-identical to theirs.

use super::bit_math;
use super::lane_transform::LaneSplit;
use super::word_packer::Word;
use crate::BLOCK_SIZE;

/// Scalar implementation of the lane-interleaved layout
pub struct ReferenceCodec;

/// Per-block geometry shared by pack and unpack
struct Geometry {
    lanes: usize,
    fields: usize,
    sub: u32,
    collapsed: usize,
    steps: usize,
}

impl Geometry {
    fn new<W: Word>(bits: u32) -> Self {
        let lanes = (128 / W::BITS) as usize;
        let split = LaneSplit::for_bits(W::BITS, bits);
        let fields = split.factor(W::BITS);
        let collapsed = BLOCK_SIZE / fields;
        Self {
            lanes,
            fields,
            sub: split.sub_bits(W::BITS),
            collapsed,
            steps: collapsed / lanes,
        }
    }

    /// Bit offset of sub-field `k` inside a word
    #[inline]
    fn offset(&self, k: usize) -> u32 {
        (self.fields - 1 - k) as u32 * self.sub
    }

    /// Natural index of the value a sub-lane packs at `step`
    #[inline]
    fn value_index(&self, lane: usize, k: usize, step: usize) -> usize {
        step * self.lanes + lane + k * self.collapsed
    }
}

impl ReferenceCodec {
    /// Words emitted for one block of `bits`-wide values
    #[inline]
    pub const fn word_count<W: Word>(bits: u32) -> usize {
        BLOCK_SIZE * bits as usize / W::BITS as usize
    }

    /// Pack 128 values; each value is masked to `bits`
    pub fn pack<W: Word>(values: &[W; BLOCK_SIZE], bits: u32, out: &mut [W]) {
        debug_assert_eq!(out.len(), Self::word_count::<W>(bits));
        let geo = Geometry::new::<W>(bits);
        let value_mask = bit_math::low_mask(bits);
        let field_mask = bit_math::low_mask(geo.sub);
        out.fill(W::ZERO);

        for lane in 0..geo.lanes {
            for k in 0..geo.fields {
                let offset = geo.offset(k);
                let mut word = 0u64;
                let mut filled = 0u32;
                let mut pos = 0usize;

                for step in 0..geo.steps {
                    let x = values[geo.value_index(lane, k, step)].to_u64() & value_mask;
                    word |= x << filled;
                    filled += bits;

                    if filled >= geo.sub {
                        out[pos * geo.lanes + lane] |= W::from_u64((word & field_mask) << offset);
                        pos += 1;
                        let rem = filled - geo.sub;
                        word = if rem == 0 { 0 } else { x >> (bits - rem) };
                        filled = rem;
                    }
                }
                debug_assert_eq!(filled, 0);
            }
        }
    }

    /// Unpack 128 values
    pub fn unpack<W: Word>(words: &[W], bits: u32, out: &mut [W; BLOCK_SIZE]) {
        debug_assert_eq!(words.len(), Self::word_count::<W>(bits));
        let geo = Geometry::new::<W>(bits);
        let value_mask = bit_math::low_mask(bits);
        let field_mask = bit_math::low_mask(geo.sub);
        let words_per_lane = words.len() / geo.lanes;

        for lane in 0..geo.lanes {
            for k in 0..geo.fields {
                let offset = geo.offset(k);
                let field = |pos: usize| (words[pos * geo.lanes + lane].to_u64() >> offset) & field_mask;
                let mut pos = 0usize;
                let mut cur = field(0);
                let mut consumed = 0u32;

                for step in 0..geo.steps {
                    let mut v = cur >> consumed;
                    consumed += bits;

                    if consumed >= geo.sub {
                        let rem = consumed - geo.sub;
                        pos += 1;
                        if pos < words_per_lane {
                            cur = field(pos);
                            if rem > 0 {
                                v |= cur << (bits - rem);
                            }
                        }
                        consumed = rem;
                    }

                    out[geo.value_index(lane, k, step)] = W::from_u64(v & value_mask);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    /// Straight port of the classic 4-lane int encoder: `bitsRemaining` counts
    /// down from 32 and the spill of a straddling value seeds the next word.
    fn encode_4x32_classic(input: &[u32; BLOCK_SIZE], bits: u32) -> Vec<u32> {
        let mask = (1u32 << bits) - 1;
        let mut tmp = vec![0u32; 4 * bits as usize + 4];
        let mut cur = 0usize;
        let mut bits_remaining = 32i32;
        for i in (0..BLOCK_SIZE).step_by(4) {
            for l in 0..4 {
                tmp[cur + l] |= (input[i + l] & mask) << (32 - bits_remaining);
            }
            bits_remaining -= bits as i32;
            if bits_remaining <= 0 {
                cur += 4;
                for l in 0..4 {
                    let shift = (bits as i32 + bits_remaining) as u32;
                    tmp[cur + l] = (input[i + l] & mask).checked_shr(shift).unwrap_or(0);
                }
                bits_remaining += 32;
            }
        }
        tmp.truncate(4 * bits as usize);
        tmp
    }

    #[test]
    fn test_matches_classic_4x32_encoder() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(2024);
        for bits in 1..=31u32 {
            let mut values = [0u32; BLOCK_SIZE];
            for v in values.iter_mut() {
                *v = rng.random_range(0..(1u32 << bits));
            }
            let mut packed = vec![0u32; ReferenceCodec::word_count::<u32>(bits)];
            ReferenceCodec::pack(&values, bits, &mut packed);
            assert_eq!(packed, encode_4x32_classic(&values, bits), "bits={}", bits);
        }
    }

    #[test]
    fn test_round_trip_both_words() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(77);
        for bits in 1..=31u32 {
            let mut values32 = [0u32; BLOCK_SIZE];
            let mut values64 = [0u64; BLOCK_SIZE];
            for i in 0..BLOCK_SIZE {
                values32[i] = rng.random_range(0..(1u32 << bits));
                values64[i] = values32[i] as u64;
            }

            let mut packed32 = vec![0u32; ReferenceCodec::word_count::<u32>(bits)];
            ReferenceCodec::pack(&values32, bits, &mut packed32);
            let mut unpacked32 = [0u32; BLOCK_SIZE];
            ReferenceCodec::unpack(&packed32, bits, &mut unpacked32);
            assert_eq!(values32, unpacked32, "32-bit words, bits={}", bits);

            let mut packed64 = vec![0u64; ReferenceCodec::word_count::<u64>(bits)];
            ReferenceCodec::pack(&values64, bits, &mut packed64);
            let mut unpacked64 = [0u64; BLOCK_SIZE];
            ReferenceCodec::unpack(&packed64, bits, &mut unpacked64);
            assert_eq!(values64, unpacked64, "64-bit words, bits={}", bits);
        }
    }

    #[test]
    fn test_byte_sub_lanes_at_full_width() {
        // bits=8 on 64-bit words: every sub-lane word is exactly one value, so the
        // packed words are the collapsed words of each lane in step order
        let mut values = [0u64; BLOCK_SIZE];
        for (i, v) in values.iter_mut().enumerate() {
            *v = i as u64;
        }
        let mut packed = [0u64; 16];
        ReferenceCodec::pack(&values, 8, &mut packed);
        assert_eq!(packed[0], 0x0010_2030_4050_6070);
        assert_eq!(packed[1], 0x0111_2131_4151_6171);
        assert_eq!(packed[2], 0x0212_2232_4252_6272);
    }

    #[test]
    fn test_masks_out_of_range_values() {
        let values = [u64::MAX; BLOCK_SIZE];
        let mut packed = [0u64; 4];
        ReferenceCodec::pack(&values, 2, &mut packed);
        assert!(packed.iter().all(|&w| w == u64::MAX));

        let mut unpacked = [0u64; BLOCK_SIZE];
        ReferenceCodec::unpack(&packed, 2, &mut unpacked);
        assert!(unpacked.iter().all(|&v| v == 3));
    }
}
