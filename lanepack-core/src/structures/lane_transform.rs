//! Sub-word lane transform for the 64-bit word path
//!
//! Narrow values waste most of a 64-bit lane. Before packing, `collapse` folds
//! the natural 128-value block into `128 / G` words holding `G` sub-fields of
//! `S = 64 / G` bits each: collapsed word `i` carries `values[i + k * 128 / G]` in
//! sub-field `k`, with `k = 0` in the most significant field. The packer then
//! runs one cursor per sub-field, multiplying the lane count by `G`. `expand`
//! is the exact inverse.
//!
//! Bit width mapping for 64-bit words:
//!   1-8    -> bytes     (G = 8)
//!   9-16   -> halfwords (G = 4)
//!   17-31  -> whole     (identity)
//!
//! 32-bit words always use the identity. The `Words` split (G = 2) is never
//! packed; it is the layout of interleaved pair decoding, where word `i` holds
//! `values[i]` in the high half and `values[i + 64]` in the low half.

use super::bit_math;
use super::word_packer::Word;
use crate::BLOCK_SIZE;

/// Number of values interleaved into one pair-decoded u64
pub const PAIR_COUNT: usize = BLOCK_SIZE / 2;

/// Sub-word granularity of a lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneSplit {
    /// One value per lane word
    Whole,
    /// Two 32-bit fields per u64
    Words,
    /// Four 16-bit fields per u64
    Halfwords,
    /// Eight 8-bit fields per u64
    Bytes,
}

impl LaneSplit {
    /// Split used to pack `bits`-wide values into `word_bits`-wide words
    #[inline]
    pub fn for_bits(word_bits: u32, bits: u32) -> Self {
        if word_bits < 64 {
            LaneSplit::Whole
        } else if bits <= 8 {
            LaneSplit::Bytes
        } else if bits <= 16 {
            LaneSplit::Halfwords
        } else {
            LaneSplit::Whole
        }
    }

    /// Width `S` of one sub-field
    #[inline]
    pub const fn sub_bits(self, word_bits: u32) -> u32 {
        match self {
            LaneSplit::Whole => word_bits,
            LaneSplit::Words => 32,
            LaneSplit::Halfwords => 16,
            LaneSplit::Bytes => 8,
        }
    }

    /// Sub-fields per word (`G`)
    #[inline]
    pub const fn factor(self, word_bits: u32) -> usize {
        (word_bits / self.sub_bits(word_bits)) as usize
    }

    /// Number of collapsed words for one block
    #[inline]
    pub const fn collapsed_len(self, word_bits: u32) -> usize {
        BLOCK_SIZE / self.factor(word_bits)
    }
}

/// Fold a natural-order block into `128 / G` sub-field words
///
/// Each value is masked to the sub-field width. With `LaneSplit::Whole` this
/// is a plain copy.
pub fn collapse<W: Word>(values: &[W; BLOCK_SIZE], split: LaneSplit, out: &mut [u64]) {
    let g = split.factor(64);
    let sub = split.sub_bits(64);
    let n = BLOCK_SIZE / g;
    debug_assert!(out.len() >= n);
    let field = bit_math::low_mask(sub);

    for (i, word) in out[..n].iter_mut().enumerate() {
        let mut w = 0u64;
        for k in 0..g {
            let shift = (g - 1 - k) as u32 * sub;
            w |= (values[i + k * n].to_u64() & field) << shift;
        }
        *word = w;
    }
}

/// Inverse of [`collapse`]
pub fn expand<W: Word>(collapsed: &[u64], split: LaneSplit, out: &mut [W; BLOCK_SIZE]) {
    let g = split.factor(64);
    let sub = split.sub_bits(64);
    let n = BLOCK_SIZE / g;
    debug_assert!(collapsed.len() >= n);
    let field = bit_math::low_mask(sub);

    for (i, &w) in collapsed[..n].iter().enumerate() {
        for k in 0..g {
            let shift = (g - 1 - k) as u32 * sub;
            out[i + k * n] = W::from_u64((w >> shift) & field);
        }
    }
}

/// Regroup collapsed words straight into interleaved pairs
///
/// Produces the same output as `expand` followed by `collapse(.., Words, ..)`
/// without materializing the natural order: the two fields `k` and `k + G/2`
/// of a collapsed word are shifted onto bit 32 and bit 0 and masked in one step.
pub fn widen_to_pairs(collapsed: &[u64], split: LaneSplit, out: &mut [u64; PAIR_COUNT]) {
    if split == LaneSplit::Whole {
        for (i, pair) in out.iter_mut().enumerate() {
            *pair = (collapsed[i] << 32) | (collapsed[i + PAIR_COUNT] & 0xFFFF_FFFF);
        }
        return;
    }

    let g = split.factor(64);
    let sub = split.sub_bits(64);
    let n = BLOCK_SIZE / g;
    let half = g / 2;
    // one `sub`-wide field at bit 0 and one at bit 32
    let pair_mask = bit_math::MASKS32[sub as usize];

    for (i, &w) in collapsed[..n].iter().enumerate() {
        for k in 0..half {
            let shift = (half - 1 - k) as u32 * sub;
            out[i + k * n] = (w >> shift) & pair_mask;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    fn sequential() -> [u64; BLOCK_SIZE] {
        let mut values = [0u64; BLOCK_SIZE];
        for (i, v) in values.iter_mut().enumerate() {
            *v = i as u64;
        }
        values
    }

    #[test]
    fn test_split_selection() {
        assert_eq!(LaneSplit::for_bits(32, 3), LaneSplit::Whole);
        assert_eq!(LaneSplit::for_bits(32, 12), LaneSplit::Whole);
        assert_eq!(LaneSplit::for_bits(64, 1), LaneSplit::Bytes);
        assert_eq!(LaneSplit::for_bits(64, 8), LaneSplit::Bytes);
        assert_eq!(LaneSplit::for_bits(64, 9), LaneSplit::Halfwords);
        assert_eq!(LaneSplit::for_bits(64, 16), LaneSplit::Halfwords);
        assert_eq!(LaneSplit::for_bits(64, 17), LaneSplit::Whole);
        assert_eq!(LaneSplit::for_bits(64, 31), LaneSplit::Whole);
    }

    #[test]
    fn test_split_geometry() {
        assert_eq!(LaneSplit::Bytes.collapsed_len(64), 16);
        assert_eq!(LaneSplit::Halfwords.collapsed_len(64), 32);
        assert_eq!(LaneSplit::Words.collapsed_len(64), 64);
        assert_eq!(LaneSplit::Whole.collapsed_len(64), 128);
        assert_eq!(LaneSplit::Whole.collapsed_len(32), 128);
        assert_eq!(LaneSplit::Whole.sub_bits(32), 32);
    }

    #[test]
    fn test_collapse_bytes_layout() {
        let values = sequential();
        let mut collapsed = [0u64; 16];
        collapse(&values, LaneSplit::Bytes, &mut collapsed);

        // word 0 holds values 0, 16, .., 112 with value 0 in the top byte
        assert_eq!(collapsed[0], 0x0010_2030_4050_6070);
        assert_eq!(collapsed[15], 0x0F1F_2F3F_4F5F_6F7F);
    }

    #[test]
    fn test_collapse_halfwords_layout() {
        let values = sequential();
        let mut collapsed = [0u64; 32];
        collapse(&values, LaneSplit::Halfwords, &mut collapsed);
        assert_eq!(collapsed[1], 0x0001_0021_0041_0061);
    }

    #[test]
    fn test_collapse_expand_inverse() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        for (split, bits) in [
            (LaneSplit::Bytes, 8u32),
            (LaneSplit::Halfwords, 16),
            (LaneSplit::Words, 32),
            (LaneSplit::Whole, 63),
        ] {
            let mut values = [0u64; BLOCK_SIZE];
            for v in values.iter_mut() {
                *v = rng.random_range(0..=bit_math::low_mask(bits));
            }

            let mut collapsed = [0u64; BLOCK_SIZE];
            collapse(&values, split, &mut collapsed);
            let mut restored = [0u64; BLOCK_SIZE];
            expand(&collapsed, split, &mut restored);

            assert_eq!(values, restored, "split={:?}", split);
        }
    }

    #[test]
    fn test_collapse_masks_to_field() {
        let values = [0x1FFu64; BLOCK_SIZE];
        let mut collapsed = [0u64; 16];
        collapse(&values, LaneSplit::Bytes, &mut collapsed);
        assert!(collapsed.iter().all(|&w| w == u64::MAX));
    }

    #[test]
    fn test_words_collapse_is_pair_layout() {
        let values = sequential();
        let mut pairs = [0u64; BLOCK_SIZE];
        collapse(&values, LaneSplit::Words, &mut pairs);
        for i in 0..PAIR_COUNT {
            assert_eq!(pairs[i], ((i as u64) << 32) | (i as u64 + 64));
        }
    }

    #[test]
    fn test_widen_to_pairs_matches_words_collapse() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for (split, bits) in [
            (LaneSplit::Bytes, 8u32),
            (LaneSplit::Halfwords, 16),
            (LaneSplit::Whole, 31),
        ] {
            let mut values = [0u64; BLOCK_SIZE];
            for v in values.iter_mut() {
                *v = rng.random_range(0..=bit_math::low_mask(bits));
            }

            let mut expected = [0u64; BLOCK_SIZE];
            collapse(&values, LaneSplit::Words, &mut expected);

            let mut collapsed = [0u64; BLOCK_SIZE];
            collapse(&values, split, &mut collapsed);
            let mut pairs = [0u64; PAIR_COUNT];
            widen_to_pairs(&collapsed, split, &mut pairs);

            assert_eq!(&pairs[..], &expected[..PAIR_COUNT], "split={:?}", split);
        }
    }

    #[test]
    fn test_u32_values() {
        let mut values = [0u32; BLOCK_SIZE];
        for (i, v) in values.iter_mut().enumerate() {
            *v = (i * 3 % 251) as u32;
        }
        let mut collapsed = [0u64; 16];
        collapse(&values, LaneSplit::Bytes, &mut collapsed);
        let mut restored = [0u32; BLOCK_SIZE];
        expand(&collapsed, LaneSplit::Bytes, &mut restored);
        assert_eq!(values, restored);
    }
}
