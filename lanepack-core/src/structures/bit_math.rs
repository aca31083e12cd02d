//! Replicated low-bit masks for sub-word lanes
//!
//! `MASKS8[k]` holds `k` contiguous low ones in each byte of a u64, `MASKS16[k]`
//! the same per halfword, `MASKS32[k]` per 32-bit half and `MASKS64[k]` for the
//! whole word. Every table includes its full-width entry, so `MASKS8[8]` is
//! `u64::MAX`. Truncating a replicated mask to u32 yields the mask for u32 words.

pub const MASKS8: [u64; 9] = build_masks::<9>(8);
pub const MASKS16: [u64; 17] = build_masks::<17>(16);
pub const MASKS32: [u64; 33] = build_masks::<33>(32);
pub const MASKS64: [u64; 65] = build_masks::<65>(64);

const fn build_masks<const N: usize>(sub_bits: u32) -> [u64; N] {
    let mut masks = [0u64; N];
    let mut k = 0;
    while k < N {
        masks[k] = replicated_mask(sub_bits, k as u32);
        k += 1;
    }
    masks
}

/// `k` contiguous low ones (`k` may be 64)
#[inline]
pub const fn low_mask(k: u32) -> u64 {
    if k >= 64 { u64::MAX } else { (1u64 << k) - 1 }
}

/// `k` low ones repeated in every `sub_bits`-wide field of a u64
///
/// `k` must not exceed `sub_bits`, otherwise neighbouring fields overlap.
pub const fn replicated_mask(sub_bits: u32, k: u32) -> u64 {
    let field = low_mask(k);
    let mut mask = 0u64;
    let mut offset = 0;
    while offset < 64 {
        mask |= field << offset;
        offset += sub_bits;
    }
    mask
}

/// Table lookup of [`replicated_mask`] for the four supported granularities
#[inline]
pub fn sub_mask(sub_bits: u32, k: u32) -> u64 {
    debug_assert!(k <= sub_bits);
    match sub_bits {
        8 => MASKS8[k as usize],
        16 => MASKS16[k as usize],
        32 => MASKS32[k as usize],
        _ => MASKS64[k as usize],
    }
}
