// Chroma
// Copyright (c) 2024 The Project Chroma Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A parallel PNG encoder for 8-bit RGB rasters.
//!
//! The encoder writes the deflate stream itself rather than delegating to a general-purpose
//! compressor: the input is always 8-bit truecolour, so the pipeline commits to fixed Huffman
//! coding, specialises its match search for filtered scanlines, and shards the image into
//! horizontal bands that compress concurrently into one deflate block.
//!
//! Three [`Variant`]s of ascending sophistication are exposed through a single entry point.
//! They share the checksum, bit-emission, and container stages; only the scanline filter and
//! the match search differ.
//!
//! ```no_run
//! use chroma_codec_png::{EncoderOptions, PngEncoder, Raster};
//!
//! # fn main() -> chroma_core::errors::Result<()> {
//! let rgb = vec![0u8; 3 * 640 * 480];
//! let raster = Raster::new(640, 480, &rgb)?;
//!
//! let encoder = PngEncoder::new(EncoderOptions::default());
//! let png = encoder.encode_to_vec(&raster)?;
//! # let _ = png;
//! # Ok(())
//! # }
//! ```

use std::io::Write;
use std::time::Instant;

use log::debug;

use chroma_core::checksum::adler32_simd;
use chroma_core::errors::invalid_input_error;
pub use chroma_core::errors::{Error, Result};

mod filter;
mod huffman;
mod lz;
mod pool;
mod writer;

use filter::{filter_rows, FilterStrategy};
use writer::ChunkWriter;

/// The encoder generation to use.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Variant {
    /// Sub-filter every row and collapse runs of identical filtered triplets into distance-3
    /// references. The fastest strategy; effective on flat or horizontally banded images.
    SubRle,
    /// Leave rows unfiltered and search the current and previous scanlines for repeated RGB
    /// triplets. Effective on images with vertical structure.
    TwoRow,
    /// Select a filter per row by heuristic and run a hash-chain match search over a 32 KiB
    /// window. The strongest strategy, and the only one that shards across workers.
    HashChain,
}

/// Options controlling an encode.
#[derive(Copy, Clone, Debug)]
pub struct EncoderOptions {
    pub variant: Variant,
    /// The number of shards for [`Variant::HashChain`]. One shard encodes on the calling
    /// thread; zero selects the worker pool's current thread count. Output bytes depend only
    /// on this value, never on scheduling, so a fixed shard count gives reproducible files.
    pub workers: usize,
}

impl Default for EncoderOptions {
    fn default() -> EncoderOptions {
        EncoderOptions { variant: Variant::HashChain, workers: 1 }
    }
}

/// An immutable view of an 8-bit RGB raster in row-major order, top to bottom.
#[derive(Copy, Clone)]
pub struct Raster<'a> {
    width: u32,
    height: u32,
    data: &'a [u8],
}

impl<'a> Raster<'a> {
    /// Wraps an RGB byte buffer, validating its dimensions.
    ///
    /// The buffer must hold exactly `3 * width * height` bytes, and the filtered image
    /// `(3 * width + 1) * height` must stay within a 32-bit byte count.
    pub fn new(width: u32, height: u32, data: &'a [u8]) -> Result<Raster<'a>> {
        if width == 0 || height == 0 {
            return invalid_input_error("raster dimensions must be non-zero");
        }

        let n_samples = 3 * u64::from(width) * u64::from(height);
        if data.len() as u64 != n_samples {
            return invalid_input_error("rgb buffer length must equal 3 * width * height");
        }

        if (n_samples + u64::from(height)) > u64::from(u32::MAX) {
            return invalid_input_error("filtered image exceeds a 32-bit byte count");
        }

        Ok(Raster { width, height, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The raw RGB bytes.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

/// A PNG encoder configured for one strategy.
///
/// The encoder holds no per-image state; one instance may encode any number of rasters, and a
/// given raster always produces byte-identical output.
pub struct PngEncoder {
    opts: EncoderOptions,
}

impl PngEncoder {
    pub fn new(opts: EncoderOptions) -> PngEncoder {
        PngEncoder { opts }
    }

    /// Encodes the raster as a complete PNG file into `out` and returns the total number of
    /// bytes written.
    ///
    /// A write failure aborts the encode immediately; whatever bytes reached the sink are left
    /// in place.
    pub fn encode<W: Write>(&self, raster: &Raster<'_>, out: W) -> Result<u64> {
        let t0 = Instant::now();

        let mut writer = ChunkWriter::new(out);
        writer.write_signature()?;
        writer.write_ihdr(raster.width, raster.height)?;

        let (adler, block) = self.compress(raster);
        writer.write_idat(&writer::idat_payload(&block, adler))?;
        writer.write_iend()?;

        debug!(
            "{:?}: encoded {}x{} to {} bytes in {:?}",
            self.opts.variant,
            raster.width,
            raster.height,
            writer.pos(),
            t0.elapsed()
        );

        Ok(writer.pos())
    }

    /// Encodes the raster into a freshly allocated buffer.
    pub fn encode_to_vec(&self, raster: &Raster<'_>) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode(raster, &mut out)?;
        Ok(out)
    }

    /// Runs the filter, checksum, match-search, and bit-emission stages, returning the
    /// Adler-32 of the filtered buffer and the complete deflate block.
    fn compress(&self, raster: &Raster<'_>) -> (u32, Vec<u8>) {
        let width = raster.width as usize;
        let height = raster.height as usize;

        match self.opts.variant {
            Variant::SubRle => {
                let filtered =
                    filter_rows(FilterStrategy::Sub, raster.data, width, 0, height, None);
                let adler = adler32_simd(&filtered);
                let tokens = lz::encode_sub_rle(&filtered, width, height);
                (adler, huffman::assemble_block(&[huffman::emit_fragment(&tokens)]))
            }
            Variant::TwoRow => {
                let filtered =
                    filter_rows(FilterStrategy::None, raster.data, width, 0, height, None);
                let adler = adler32_simd(&filtered);
                let tokens = lz::encode_two_row(raster.data, width, height);
                (adler, huffman::assemble_block(&[huffman::emit_fragment(&tokens)]))
            }
            Variant::HashChain => {
                let workers = match self.opts.workers {
                    0 => rayon::current_num_threads().max(1),
                    n => n,
                };

                if workers > 1 {
                    return pool::encode_sharded(raster.data, width, height, workers);
                }

                let t0 = Instant::now();
                let filtered =
                    filter_rows(FilterStrategy::Adaptive, raster.data, width, 0, height, None);
                let t1 = Instant::now();
                let adler = adler32_simd(&filtered);
                let t2 = Instant::now();
                let tokens = lz::encode_hash_chain(&filtered);
                let t3 = Instant::now();
                let block = huffman::assemble_block(&[huffman::emit_fragment(&tokens)]);

                debug!(
                    "filter {:?}, adler32 {:?}, lz {:?}, huffman {:?}",
                    t1 - t0,
                    t2 - t1,
                    t3 - t2,
                    t3.elapsed()
                );

                (adler, block)
            }
        }
    }
}
