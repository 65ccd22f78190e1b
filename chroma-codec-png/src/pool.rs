// Chroma
// Copyright (c) 2024 The Project Chroma Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `pool` module shards an encode across a worker pool.
//!
//! The image is split into contiguous horizontal bands, one per worker. Each band filters and
//! LZ-encodes its rows independently; back-references therefore never reach across a band
//! boundary, which keeps the band code streams concatenable at a small compression cost near
//! the seams. The scheduler is a pure fork-join barrier: no job communicates with another, and
//! all results are merged in band order after the join, so output is deterministic for a given
//! band count.

use std::time::Instant;

use log::debug;
use rayon::prelude::*;

use chroma_core::checksum::{adler32_combine, adler32_simd};
use chroma_core::io::BitSink;

use crate::filter::{filter_rows, FilterStrategy, BYTES_PER_PIXEL};
use crate::huffman;
use crate::lz::{self, Token};

/// The output of one band's filter and LZ passes.
struct BandOutput {
    tokens: Vec<Token>,
    /// Adler-32 of this band's filtered bytes alone.
    adler: u32,
    n_filtered: usize,
}

/// The rows of band `band` out of `n_bands`: a contiguous, possibly empty range. The full row
/// set is covered exactly once across all bands.
fn band_rows(height: usize, n_bands: usize, band: usize) -> (usize, usize) {
    (band * height / n_bands, (band + 1) * height / n_bands)
}

/// Filters and compresses the raster across `n_bands` parallel shards, returning the Adler-32
/// of the whole filtered buffer and the deflate block.
pub fn encode_sharded(data: &[u8], width: usize, height: usize, n_bands: usize) -> (u32, Vec<u8>) {
    debug_assert!(n_bands >= 2);

    let t0 = Instant::now();

    let outputs: Vec<BandOutput> = (0..n_bands)
        .into_par_iter()
        .map(|band| {
            let (row_start, row_end) = band_rows(height, n_bands, band);
            encode_band(data, width, row_start, row_end)
        })
        .collect();

    let t1 = Instant::now();

    // Fold the band partials into the checksum of the concatenated filtered buffer. The unit
    // element is the checksum of the empty sequence.
    let adler = outputs.iter().fold(1, |acc, out| adler32_combine(acc, out.adler, out.n_filtered));

    let fragments: Vec<BitSink> =
        outputs.par_iter().map(|out| huffman::emit_fragment(&out.tokens)).collect();
    let block = huffman::assemble_block(&fragments);

    debug!(
        "sharded encode: {} bands, filter+lz {:?}, adler+huffman {:?}",
        n_bands,
        t1 - t0,
        t1.elapsed()
    );

    (adler, block)
}

fn encode_band(data: &[u8], width: usize, row_start: usize, row_end: usize) -> BandOutput {
    // The raw row above the band seeds the first row's filter; only the true top of the image
    // sees a zero row.
    let prev_row = if row_start > 0 {
        let stride = BYTES_PER_PIXEL * width;
        Some(&data[(row_start - 1) * stride..row_start * stride])
    }
    else {
        None
    };

    let filtered =
        filter_rows(FilterStrategy::Adaptive, data, width, row_start, row_end, prev_row);
    let adler = adler32_simd(&filtered);
    let tokens = lz::encode_hash_chain(&filtered);

    BandOutput { tokens, adler, n_filtered: filtered.len() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_band_partition() {
        // Bands tile the row range exactly, in order, including empty bands when the pool is
        // larger than the image.
        for (height, n_bands) in [(32, 4), (33, 4), (3, 8), (1, 3), (100, 7)] {
            let mut next = 0;
            for band in 0..n_bands {
                let (a, b) = band_rows(height, n_bands, band);
                assert_eq!(a, next);
                assert!(b >= a);
                next = b;
            }
            assert_eq!(next, height);
        }
    }

    #[test]
    fn verify_sharded_matches_checksum_of_whole() {
        let width = 8;
        let height = 13;
        let data: Vec<u8> =
            (0..3 * width * height).map(|v| (v as u32 * 17 % 256) as u8).collect();

        let (adler, _) = encode_sharded(&data, width, height, 3);

        // Reference: filter the whole image in one pass and checksum it directly.
        let whole = filter_rows(FilterStrategy::Adaptive, &data, width, 0, height, None);
        assert_eq!(adler, chroma_core::checksum::adler32(&whole));
    }

    #[test]
    fn verify_sharded_deterministic() {
        let width = 16;
        let height = 64;
        let data = vec![0x3cu8; 3 * width * height];

        let a = encode_sharded(&data, width, height, 4);
        let b = encode_sharded(&data, width, height, 4);
        assert_eq!(a.0, b.0);
        assert_eq!(a.1, b.1);
    }
}
