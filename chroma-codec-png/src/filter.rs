// Chroma
// Copyright (c) 2024 The Project Chroma Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `filter` module implements PNG scanline filtering for 8-bit RGB rasters.
//!
//! Each output row is one filter-type byte followed by the filtered samples. All arithmetic is
//! modulo 256; a decoder reverses the transform row-by-row using the reconstructed previous row.

/// Bytes per pixel for 8-bit RGB.
pub const BYTES_PER_PIXEL: usize = 3;

/// The per-row filter selection strategy.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FilterStrategy {
    /// Filter type 0 for every row. The filtered row is the raw row.
    None,
    /// Filter type 1 (sub) for every row.
    Sub,
    /// Per-row selection by the minimum sum of absolute differences heuristic over filter
    /// types 0 through 4.
    Adaptive,
}

const FILTER_NONE: u8 = 0;
const FILTER_SUB: u8 = 1;
const FILTER_UP: u8 = 2;
const FILTER_AVERAGE: u8 = 3;
const FILTER_PAETH: u8 = 4;

/// Filters rows `row_start..row_end` of the raster into a freshly allocated buffer of
/// `(3W + 1) * (row_end - row_start)` bytes.
///
/// `prev_row` is the raw raster row immediately above `row_start`, or `None` when `row_start` is
/// the top of the image, in which case the row above is treated as all zeros. Rows within the
/// range always reference their true predecessor, so a buffer filtered in independent row bands
/// reconstructs identically to one filtered in a single pass.
pub fn filter_rows(
    strategy: FilterStrategy,
    data: &[u8],
    width: usize,
    row_start: usize,
    row_end: usize,
    prev_row: Option<&[u8]>,
) -> Vec<u8> {
    let stride = BYTES_PER_PIXEL * width;
    let mut out = Vec::with_capacity((stride + 1) * (row_end - row_start));

    for j in row_start..row_end {
        let cur = &data[j * stride..(j + 1) * stride];
        let prev = if j == row_start {
            prev_row
        }
        else {
            Some(&data[(j - 1) * stride..j * stride])
        };

        let ty = match strategy {
            FilterStrategy::None => FILTER_NONE,
            FilterStrategy::Sub => FILTER_SUB,
            FilterStrategy::Adaptive => select_filter(cur, prev),
        };

        out.push(ty);
        filter_row(ty, cur, prev, &mut out);
    }

    out
}

/// Applies filter type `ty` to one row, appending the filtered samples to `out`.
fn filter_row(ty: u8, cur: &[u8], prev: Option<&[u8]>, out: &mut Vec<u8>) {
    match ty {
        FILTER_NONE => out.extend_from_slice(cur),
        FILTER_SUB => {
            for (i, &x) in cur.iter().enumerate() {
                out.push(x.wrapping_sub(left(cur, i)));
            }
        }
        FILTER_UP => {
            for (i, &x) in cur.iter().enumerate() {
                out.push(x.wrapping_sub(above(prev, i)));
            }
        }
        FILTER_AVERAGE => {
            for (i, &x) in cur.iter().enumerate() {
                let a = u16::from(left(cur, i));
                let b = u16::from(above(prev, i));
                out.push(x.wrapping_sub(((a + b) >> 1) as u8));
            }
        }
        FILTER_PAETH => {
            for (i, &x) in cur.iter().enumerate() {
                let a = left(cur, i);
                let b = above(prev, i);
                let c = above_left(prev, i);
                out.push(x.wrapping_sub(paeth_predict(a, b, c)));
            }
        }
        _ => unreachable!("invalid filter type {}", ty),
    }
}

/// Scores all five filter types for one row in a single pass and returns the type with the
/// minimum sum of absolute differences, the selection heuristic recommended by the PNG
/// specification. Candidate rows are never materialized; ties resolve to the lowest type code.
fn select_filter(cur: &[u8], prev: Option<&[u8]>) -> u8 {
    let mut scores = [0u64; 5];

    for (i, &x) in cur.iter().enumerate() {
        let a = left(cur, i);
        let b = above(prev, i);
        let c = above_left(prev, i);

        scores[0] += mad_weight(x);
        scores[1] += mad_weight(x.wrapping_sub(a));
        scores[2] += mad_weight(x.wrapping_sub(b));
        scores[3] += mad_weight(x.wrapping_sub(((u16::from(a) + u16::from(b)) >> 1) as u8));
        scores[4] += mad_weight(x.wrapping_sub(paeth_predict(a, b, c)));
    }

    let mut best = 0;
    for ty in 1..5 {
        if scores[ty] < scores[best] {
            best = ty;
        }
    }
    best as u8
}

/// The cost of one filtered byte under the minimum sum of absolute differences heuristic: the
/// magnitude of the byte interpreted as a signed residual.
#[inline(always)]
fn mad_weight(f: u8) -> u64 {
    let f = u64::from(f);
    f.min(256 - f)
}

#[inline(always)]
fn left(cur: &[u8], i: usize) -> u8 {
    if i >= BYTES_PER_PIXEL {
        cur[i - BYTES_PER_PIXEL]
    }
    else {
        0
    }
}

#[inline(always)]
fn above(prev: Option<&[u8]>, i: usize) -> u8 {
    match prev {
        Some(row) => row[i],
        None => 0,
    }
}

#[inline(always)]
fn above_left(prev: Option<&[u8]>, i: usize) -> u8 {
    match prev {
        Some(row) if i >= BYTES_PER_PIXEL => row[i - BYTES_PER_PIXEL],
        _ => 0,
    }
}

/// The Paeth predictor: whichever of left, above, and above-left is closest to their linear
/// estimate, with ties broken in that order.
#[inline(always)]
fn paeth_predict(a: u8, b: u8, c: u8) -> u8 {
    let p = i32::from(a) + i32::from(b) - i32::from(c);
    let pa = (p - i32::from(a)).abs();
    let pb = (p - i32::from(b)).abs();
    let pc = (p - i32::from(c)).abs();

    if pa <= pb && pa <= pc {
        a
    }
    else if pb <= pc {
        b
    }
    else {
        c
    }
}
