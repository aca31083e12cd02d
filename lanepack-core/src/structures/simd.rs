//! Explicit SIMD kernels for the lane-interleaved packers
//!
//! One 128-bit register holds one word per lane, so a block is packed with a
//! single accumulator register and a shared fill counter:
//! - **4 x 32-bit lanes**: the 32-bit word layout
//! - **2 x 64-bit lanes**: the 64-bit word layout, including byte/halfword sub-lanes
//!
//! Supports:
//! - **NEON** on aarch64 (Apple Silicon, ARM servers)
//! - **SSE2** on x86_64 (Intel/AMD)
//! - **Portable fallback** (`WordPacker`) for other architectures
//!
//! Every kernel produces exactly the words `WordPacker` produces.

use super::lane_transform::LaneSplit;
use super::word_packer::{Packer32x4, Packer64x2};

// ============================================================================
// NEON intrinsics for aarch64 (Apple Silicon, ARM servers)
// ============================================================================

#[cfg(target_arch = "aarch64")]
mod neon {
    use crate::structures::bit_math;
    use std::arch::aarch64::*;

    /// Pack 4 lanes of 32-bit words
    #[target_feature(enable = "neon")]
    pub unsafe fn pack_4x32(values: &[u32], bits: u32, out: &mut [u32]) {
        unsafe {
            let value_mask = vdupq_n_u32(bit_math::low_mask(bits) as u32);
            let mut out_ptr = out.as_mut_ptr();
            let mut acc = vdupq_n_u32(0);
            let mut filled = 0u32;

            for step in 0..values.len() / 4 {
                let x = vandq_u32(vld1q_u32(values.as_ptr().add(step * 4)), value_mask);
                // shifts past the lane width drop the overflow bits
                acc = vorrq_u32(acc, vshlq_u32(x, vdupq_n_s32(filled as i32)));
                filled += bits;

                if filled >= 32 {
                    vst1q_u32(out_ptr, acc);
                    out_ptr = out_ptr.add(4);
                    let rem = filled - 32;
                    // negative shift counts shift right
                    acc = vshlq_u32(x, vdupq_n_s32(-((bits - rem) as i32)));
                    filled = rem;
                }
            }
        }
    }

    /// Unpack 4 lanes of 32-bit words
    #[target_feature(enable = "neon")]
    pub unsafe fn unpack_4x32(words: &[u32], bits: u32, out: &mut [u32]) {
        unsafe {
            let value_mask = vdupq_n_u32(bit_math::low_mask(bits) as u32);
            let registers = words.len() / 4;
            let mut cur = vld1q_u32(words.as_ptr());
            let mut loaded = 1;
            let mut consumed = 0u32;

            for step in 0..out.len() / 4 {
                let mut v = vshlq_u32(cur, vdupq_n_s32(-(consumed as i32)));
                consumed += bits;

                if consumed >= 32 {
                    let rem = consumed - 32;
                    if loaded < registers {
                        let next = vld1q_u32(words.as_ptr().add(loaded * 4));
                        loaded += 1;
                        v = vorrq_u32(v, vshlq_u32(next, vdupq_n_s32((bits - rem) as i32)));
                        cur = next;
                    }
                    consumed = rem;
                }

                vst1q_u32(out.as_mut_ptr().add(step * 4), vandq_u32(v, value_mask));
            }
        }
    }

    /// Pack 2 lanes of 64-bit words with `sub`-bit fields
    #[target_feature(enable = "neon")]
    pub unsafe fn pack_2x64(values: &[u64], bits: u32, sub: u32, out: &mut [u64]) {
        unsafe {
            let value_mask = vdupq_n_u64(bit_math::sub_mask(sub, bits));
            let mut out_ptr = out.as_mut_ptr();
            let mut acc = vdupq_n_u64(0);
            let mut filled = 0u32;

            for step in 0..values.len() / 2 {
                let x = vandq_u64(vld1q_u64(values.as_ptr().add(step * 2)), value_mask);
                let room = vdupq_n_u64(bit_math::sub_mask(sub, sub - filled));
                acc = vorrq_u64(acc, vshlq_u64(vandq_u64(x, room), vdupq_n_s64(filled as i64)));
                filled += bits;

                if filled >= sub {
                    vst1q_u64(out_ptr, acc);
                    out_ptr = out_ptr.add(2);
                    let rem = filled - sub;
                    let keep = vdupq_n_u64(bit_math::sub_mask(sub, rem));
                    acc = vandq_u64(vshlq_u64(x, vdupq_n_s64(-((bits - rem) as i64))), keep);
                    filled = rem;
                }
            }
        }
    }

    /// Unpack 2 lanes of 64-bit words with `sub`-bit fields
    #[target_feature(enable = "neon")]
    pub unsafe fn unpack_2x64(words: &[u64], bits: u32, sub: u32, out: &mut [u64]) {
        unsafe {
            let value_mask = vdupq_n_u64(bit_math::sub_mask(sub, bits));
            let registers = words.len() / 2;
            let mut cur = vld1q_u64(words.as_ptr());
            let mut loaded = 1;
            let mut consumed = 0u32;

            for step in 0..out.len() / 2 {
                let own = vdupq_n_u64(bit_math::sub_mask(sub, sub - consumed));
                let mut v = vandq_u64(vshlq_u64(cur, vdupq_n_s64(-(consumed as i64))), own);
                consumed += bits;

                if consumed >= sub {
                    let rem = consumed - sub;
                    if loaded < registers {
                        let next = vld1q_u64(words.as_ptr().add(loaded * 2));
                        loaded += 1;
                        let low = vdupq_n_u64(bit_math::sub_mask(sub, rem));
                        let high = vshlq_u64(vandq_u64(next, low), vdupq_n_s64((bits - rem) as i64));
                        v = vorrq_u64(v, high);
                        cur = next;
                    }
                    consumed = rem;
                }

                vst1q_u64(out.as_mut_ptr().add(step * 2), vandq_u64(v, value_mask));
            }
        }
    }

    #[inline]
    pub fn is_available() -> bool {
        std::arch::is_aarch64_feature_detected!("neon")
    }
}

// ============================================================================
// SSE2 intrinsics for x86_64 (Intel/AMD)
// ============================================================================

#[cfg(target_arch = "x86_64")]
mod sse {
    use crate::structures::bit_math;
    use std::arch::x86_64::*;

    /// Pack 4 lanes of 32-bit words
    #[target_feature(enable = "sse2")]
    pub unsafe fn pack_4x32(values: &[u32], bits: u32, out: &mut [u32]) {
        unsafe {
            let value_mask = _mm_set1_epi32(bit_math::low_mask(bits) as u32 as i32);
            let in_ptr = values.as_ptr() as *const __m128i;
            let mut out_ptr = out.as_mut_ptr() as *mut __m128i;
            let mut acc = _mm_setzero_si128();
            let mut filled = 0u32;

            for step in 0..values.len() / 4 {
                let x = _mm_and_si128(_mm_loadu_si128(in_ptr.add(step)), value_mask);
                acc = _mm_or_si128(acc, _mm_sll_epi32(x, _mm_cvtsi32_si128(filled as i32)));
                filled += bits;

                if filled >= 32 {
                    _mm_storeu_si128(out_ptr, acc);
                    out_ptr = out_ptr.add(1);
                    let rem = filled - 32;
                    acc = _mm_srl_epi32(x, _mm_cvtsi32_si128((bits - rem) as i32));
                    filled = rem;
                }
            }
        }
    }

    /// Unpack 4 lanes of 32-bit words
    #[target_feature(enable = "sse2")]
    pub unsafe fn unpack_4x32(words: &[u32], bits: u32, out: &mut [u32]) {
        unsafe {
            let value_mask = _mm_set1_epi32(bit_math::low_mask(bits) as u32 as i32);
            let in_ptr = words.as_ptr() as *const __m128i;
            let out_ptr = out.as_mut_ptr() as *mut __m128i;
            let registers = words.len() / 4;
            let mut cur = _mm_loadu_si128(in_ptr);
            let mut loaded = 1;
            let mut consumed = 0u32;

            for step in 0..out.len() / 4 {
                let mut v = _mm_srl_epi32(cur, _mm_cvtsi32_si128(consumed as i32));
                consumed += bits;

                if consumed >= 32 {
                    let rem = consumed - 32;
                    if loaded < registers {
                        let next = _mm_loadu_si128(in_ptr.add(loaded));
                        loaded += 1;
                        v = _mm_or_si128(v, _mm_sll_epi32(next, _mm_cvtsi32_si128((bits - rem) as i32)));
                        cur = next;
                    }
                    consumed = rem;
                }

                _mm_storeu_si128(out_ptr.add(step), _mm_and_si128(v, value_mask));
            }
        }
    }

    /// Pack 2 lanes of 64-bit words with `sub`-bit fields
    #[target_feature(enable = "sse2")]
    pub unsafe fn pack_2x64(values: &[u64], bits: u32, sub: u32, out: &mut [u64]) {
        unsafe {
            let value_mask = _mm_set1_epi64x(bit_math::sub_mask(sub, bits) as i64);
            let in_ptr = values.as_ptr() as *const __m128i;
            let mut out_ptr = out.as_mut_ptr() as *mut __m128i;
            let mut acc = _mm_setzero_si128();
            let mut filled = 0u32;

            for step in 0..values.len() / 2 {
                let x = _mm_and_si128(_mm_loadu_si128(in_ptr.add(step)), value_mask);
                let room = _mm_set1_epi64x(bit_math::sub_mask(sub, sub - filled) as i64);
                acc = _mm_or_si128(acc, _mm_sll_epi64(_mm_and_si128(x, room), _mm_cvtsi32_si128(filled as i32)));
                filled += bits;

                if filled >= sub {
                    _mm_storeu_si128(out_ptr, acc);
                    out_ptr = out_ptr.add(1);
                    let rem = filled - sub;
                    let keep = _mm_set1_epi64x(bit_math::sub_mask(sub, rem) as i64);
                    acc = _mm_and_si128(_mm_srl_epi64(x, _mm_cvtsi32_si128((bits - rem) as i32)), keep);
                    filled = rem;
                }
            }
        }
    }

    /// Unpack 2 lanes of 64-bit words with `sub`-bit fields
    #[target_feature(enable = "sse2")]
    pub unsafe fn unpack_2x64(words: &[u64], bits: u32, sub: u32, out: &mut [u64]) {
        unsafe {
            let value_mask = _mm_set1_epi64x(bit_math::sub_mask(sub, bits) as i64);
            let in_ptr = words.as_ptr() as *const __m128i;
            let out_ptr = out.as_mut_ptr() as *mut __m128i;
            let registers = words.len() / 2;
            let mut cur = _mm_loadu_si128(in_ptr);
            let mut loaded = 1;
            let mut consumed = 0u32;

            for step in 0..out.len() / 2 {
                let own = _mm_set1_epi64x(bit_math::sub_mask(sub, sub - consumed) as i64);
                let mut v = _mm_and_si128(_mm_srl_epi64(cur, _mm_cvtsi32_si128(consumed as i32)), own);
                consumed += bits;

                if consumed >= sub {
                    let rem = consumed - sub;
                    if loaded < registers {
                        let next = _mm_loadu_si128(in_ptr.add(loaded));
                        loaded += 1;
                        let low = _mm_set1_epi64x(bit_math::sub_mask(sub, rem) as i64);
                        let high = _mm_sll_epi64(_mm_and_si128(next, low), _mm_cvtsi32_si128((bits - rem) as i32));
                        v = _mm_or_si128(v, high);
                        cur = next;
                    }
                    consumed = rem;
                }

                _mm_storeu_si128(out_ptr.add(step), _mm_and_si128(v, value_mask));
            }
        }
    }

    #[inline]
    pub fn is_available() -> bool {
        is_x86_feature_detected!("sse2")
    }
}

// ============================================================================
// Public dispatch functions that select SIMD or portable code at runtime
// ============================================================================

/// Whether an explicit SIMD kernel exists for this CPU
#[inline]
pub fn is_available() -> bool {
    #[cfg(target_arch = "aarch64")]
    {
        neon::is_available()
    }

    #[cfg(target_arch = "x86_64")]
    {
        sse::is_available()
    }

    #[cfg(not(any(target_arch = "aarch64", target_arch = "x86_64")))]
    {
        false
    }
}

/// Pack 128 values into `4 * bits` 32-bit words
#[inline]
pub fn pack_4x32(values: &[u32], bits: u32, out: &mut [u32]) {
    assert_eq!(values.len(), crate::BLOCK_SIZE, "Input block must hold 128 values");
    assert_eq!(out.len(), Packer32x4::word_count(bits), "Output must hold 4 * bits words");
    debug_assert!((1..32).contains(&bits));

    #[cfg(target_arch = "aarch64")]
    {
        if neon::is_available() {
            unsafe {
                neon::pack_4x32(values, bits, out);
            }
            return;
        }
    }

    #[cfg(target_arch = "x86_64")]
    {
        if sse::is_available() {
            unsafe {
                sse::pack_4x32(values, bits, out);
            }
            return;
        }
    }

    Packer32x4::pack(values, bits, LaneSplit::Whole, out);
}

/// Unpack `4 * bits` 32-bit words into 128 values
#[inline]
pub fn unpack_4x32(words: &[u32], bits: u32, out: &mut [u32]) {
    assert_eq!(words.len(), Packer32x4::word_count(bits), "Input must hold 4 * bits words");
    assert_eq!(out.len(), crate::BLOCK_SIZE, "Output block must hold 128 values");
    debug_assert!((1..32).contains(&bits));

    #[cfg(target_arch = "aarch64")]
    {
        if neon::is_available() {
            unsafe {
                neon::unpack_4x32(words, bits, out);
            }
            return;
        }
    }

    #[cfg(target_arch = "x86_64")]
    {
        if sse::is_available() {
            unsafe {
                sse::unpack_4x32(words, bits, out);
            }
            return;
        }
    }

    Packer32x4::unpack(words, bits, LaneSplit::Whole, out);
}

/// Pack natural (`Whole`) or collapsed values into `2 * bits` 64-bit words
#[inline]
pub fn pack_2x64(values: &[u64], bits: u32, split: LaneSplit, out: &mut [u64]) {
    let sub = split.sub_bits(64);
    assert_eq!(values.len(), split.collapsed_len(64), "Input length does not match lane split");
    assert_eq!(out.len(), Packer64x2::word_count(bits), "Output must hold 2 * bits words");
    debug_assert!(bits >= 1 && bits <= sub && bits < 32);

    #[cfg(target_arch = "aarch64")]
    {
        if neon::is_available() {
            unsafe {
                neon::pack_2x64(values, bits, sub, out);
            }
            return;
        }
    }

    #[cfg(target_arch = "x86_64")]
    {
        if sse::is_available() {
            unsafe {
                sse::pack_2x64(values, bits, sub, out);
            }
            return;
        }
    }

    let _ = sub;
    Packer64x2::pack(values, bits, split, out);
}

/// Unpack `2 * bits` 64-bit words into natural (`Whole`) or collapsed values
#[inline]
pub fn unpack_2x64(words: &[u64], bits: u32, split: LaneSplit, out: &mut [u64]) {
    let sub = split.sub_bits(64);
    assert_eq!(words.len(), Packer64x2::word_count(bits), "Input must hold 2 * bits words");
    assert_eq!(out.len(), split.collapsed_len(64), "Output length does not match lane split");
    debug_assert!(bits >= 1 && bits <= sub && bits < 32);

    #[cfg(target_arch = "aarch64")]
    {
        if neon::is_available() {
            unsafe {
                neon::unpack_2x64(words, bits, sub, out);
            }
            return;
        }
    }

    #[cfg(target_arch = "x86_64")]
    {
        if sse::is_available() {
            unsafe {
                sse::unpack_2x64(words, bits, sub, out);
            }
            return;
        }
    }

    let _ = sub;
    Packer64x2::unpack(words, bits, split, out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BLOCK_SIZE;
    use crate::structures::bit_math;
    use crate::structures::lane_transform;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_4x32_matches_portable() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        for bits in 1..=31u32 {
            let mut values = [0u32; BLOCK_SIZE];
            for v in values.iter_mut() {
                *v = rng.random_range(0..=bit_math::low_mask(bits) as u32);
            }

            let mut expected = vec![0u32; Packer32x4::word_count(bits)];
            Packer32x4::pack(&values, bits, LaneSplit::Whole, &mut expected);
            let mut packed = vec![0u32; Packer32x4::word_count(bits)];
            pack_4x32(&values, bits, &mut packed);
            assert_eq!(packed, expected, "pack mismatch for bits={}", bits);

            let mut unpacked = [0u32; BLOCK_SIZE];
            unpack_4x32(&packed, bits, &mut unpacked);
            assert_eq!(unpacked, values, "unpack mismatch for bits={}", bits);
        }
    }

    #[test]
    fn test_2x64_matches_portable() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(99);
        for bits in 1..=31u32 {
            let split = LaneSplit::for_bits(64, bits);
            let n = split.collapsed_len(64);
            let mut values = [0u64; BLOCK_SIZE];
            for v in values.iter_mut() {
                *v = rng.random_range(0..=bit_math::low_mask(bits));
            }
            let mut collapsed = [0u64; BLOCK_SIZE];
            lane_transform::collapse(&values, split, &mut collapsed[..n]);

            let mut expected = vec![0u64; Packer64x2::word_count(bits)];
            Packer64x2::pack(&collapsed[..n], bits, split, &mut expected);
            let mut packed = vec![0u64; Packer64x2::word_count(bits)];
            pack_2x64(&collapsed[..n], bits, split, &mut packed);
            assert_eq!(packed, expected, "pack mismatch for bits={}", bits);

            let mut decoded = [0u64; BLOCK_SIZE];
            unpack_2x64(&packed, bits, split, &mut decoded[..n]);
            assert_eq!(&decoded[..n], &collapsed[..n], "unpack mismatch for bits={}", bits);
        }
    }

    #[test]
    fn test_is_available_is_stable() {
        assert_eq!(is_available(), is_available());
    }
}
