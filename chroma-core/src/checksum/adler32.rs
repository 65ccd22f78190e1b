// Chroma
// Copyright (c) 2024 The Project Chroma Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::io::Monitor;

const BASE: u32 = 65_521;

/// The maximum number of bytes that can be summed into the 32-bit accumulators before the
/// modulus must be applied. Taken from the analysis accompanying zlib's adler32: with n = 5552,
/// 255n(n+1)/2 + (n+1)(BASE-1) still fits in 32 bits.
const NMAX: usize = 5552;

/// `Adler32` implements the zlib Adler-32 checksum.
pub struct Adler32 {
    s1: u32,
    s2: u32,
    /// Bytes accumulated since the modulus was last applied.
    pending: usize,
}

impl Adler32 {
    pub fn new() -> Adler32 {
        Adler32 { s1: 1, s2: 0, pending: 0 }
    }

    /// Get the Adler-32 of all bytes processed so far.
    pub fn adler32(&self) -> u32 {
        ((self.s2 % BASE) << 16) | (self.s1 % BASE)
    }
}

impl Default for Adler32 {
    fn default() -> Adler32 {
        Adler32::new()
    }
}

impl Monitor for Adler32 {
    #[inline(always)]
    fn process_byte(&mut self, byte: u8) {
        self.s1 += u32::from(byte);
        self.s2 += self.s1;
        self.pending += 1;

        if self.pending == NMAX {
            self.s1 %= BASE;
            self.s2 %= BASE;
            self.pending = 0;
        }
    }

    fn process_buf_bytes(&mut self, buf: &[u8]) {
        for &byte in buf {
            self.process_byte(byte);
        }
    }
}

/// Computes the Adler-32 checksum of a byte slice.
pub fn adler32(buf: &[u8]) -> u32 {
    let mut state = Adler32::new();
    state.process_buf_bytes(buf);
    state.adler32()
}

/// Computes the Adler-32 checksum of a byte slice using SIMD acceleration where available.
///
/// The result is byte-for-byte identical to [`adler32`]; the accelerated path merely reorders
/// the summation.
pub fn adler32_simd(buf: &[u8]) -> u32 {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("sse2") {
            return unsafe { x86::adler32_sse2(buf) };
        }
    }

    adler32(buf)
}

/// Combines two Adler-32 checksums as if their inputs were concatenated.
///
/// `a` is the checksum of the first sequence, `b` the checksum of the second, and `len_b` the
/// length of the second sequence in bytes. This is the standard zlib combine rule; it allows the
/// checksum of a large buffer to be assembled from independently computed partials.
pub fn adler32_combine(a: u32, b: u32, len_b: usize) -> u32 {
    let rem = (len_b % BASE as usize) as u32;

    let mut s1 = a & 0xffff;
    let mut s2 = (rem * s1) % BASE;

    s1 += (b & 0xffff) + BASE - 1;
    s2 += ((a >> 16) & 0xffff) + ((b >> 16) & 0xffff) + BASE - rem;

    if s1 >= BASE {
        s1 -= BASE;
    }
    if s1 >= BASE {
        s1 -= BASE;
    }
    if s2 >= BASE << 1 {
        s2 -= BASE << 1;
    }
    if s2 >= BASE {
        s2 -= BASE;
    }

    (s2 << 16) | s1
}

#[cfg(target_arch = "x86_64")]
mod x86 {
    use super::{BASE, NMAX};

    /// Computes Adler-32 with SSE2, 16 bytes per iteration.
    ///
    /// Per 16-byte chunk, given the running sums (s1, s2) before the chunk:
    ///
    ///   s2' = s2 + 16 * s1 + dot(bytes, [16, 15, .., 1])
    ///   s1' = s1 + sum(bytes)
    ///
    /// The byte sum comes from a sum-of-absolute-differences against zero, and the weighted sum
    /// from widening multiplies against the descending weight vector. The modulus is deferred
    /// across chunks exactly as in the scalar path, so the accumulators never overflow.
    #[target_feature(enable = "sse2")]
    pub unsafe fn adler32_sse2(buf: &[u8]) -> u32 {
        use std::arch::x86_64::*;

        let mut s1: u32 = 1;
        let mut s2: u32 = 0;

        let zero = unsafe { _mm_setzero_si128() };
        let w_lo = unsafe { _mm_setr_epi16(16, 15, 14, 13, 12, 11, 10, 9) };
        let w_hi = unsafe { _mm_setr_epi16(8, 7, 6, 5, 4, 3, 2, 1) };

        let mut chunks = buf.chunks_exact(16);
        let mut pending = 0usize;

        for chunk in &mut chunks {
            let v = unsafe { _mm_loadu_si128(chunk.as_ptr() as *const __m128i) };

            // Byte sum: two 64-bit lanes of partial sums.
            let sad = unsafe { _mm_sad_epu8(v, zero) };
            let sum = unsafe {
                _mm_cvtsi128_si32(_mm_add_epi32(sad, _mm_srli_si128(sad, 8))) as u32
            };

            // Weighted sum: widen to 16-bit lanes and multiply-accumulate against the weights.
            let lo = unsafe { _mm_unpacklo_epi8(v, zero) };
            let hi = unsafe { _mm_unpackhi_epi8(v, zero) };
            let wsum_v = unsafe {
                _mm_add_epi32(_mm_madd_epi16(lo, w_lo), _mm_madd_epi16(hi, w_hi))
            };
            let wsum = unsafe {
                let folded = _mm_add_epi32(wsum_v, _mm_srli_si128(wsum_v, 8));
                _mm_cvtsi128_si32(_mm_add_epi32(folded, _mm_srli_si128(folded, 4))) as u32
            };

            s2 += 16 * s1 + wsum;
            s1 += sum;

            pending += 16;
            if pending >= NMAX - 15 {
                s1 %= BASE;
                s2 %= BASE;
                pending = 0;
            }
        }

        for &byte in chunks.remainder() {
            s1 += u32::from(byte);
            s2 += s1;
        }

        ((s2 % BASE) << 16) | (s1 % BASE)
    }
}
