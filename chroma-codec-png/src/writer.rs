// Chroma
// Copyright (c) 2024 The Project Chroma Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `writer` module assembles the PNG container: the file signature and the length-prefixed,
//! CRC-trailed chunk framing around the compressed image data.

use std::io::Write;

use byteorder::{BigEndian, WriteBytesExt};

use chroma_core::checksum::Crc32;
use chroma_core::errors::Result;
use chroma_core::io::Monitor;

/// The 8-byte PNG file signature.
const SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a];

/// The zlib stream header declaring deflate with a 32 KiB window at default compression. The
/// check bits satisfy (0x78 * 256 + 0x5e) mod 31 == 0.
pub const ZLIB_HEADER: [u8; 2] = [0x78, 0x5e];

/// A `ChunkWriter` frames PNG chunks over any byte sink and counts the bytes written.
pub struct ChunkWriter<W: Write> {
    inner: W,
    pos: u64,
}

impl<W: Write> ChunkWriter<W> {
    pub fn new(inner: W) -> ChunkWriter<W> {
        ChunkWriter { inner, pos: 0 }
    }

    /// The number of bytes written so far.
    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn write_signature(&mut self) -> Result<()> {
        self.inner.write_all(&SIGNATURE)?;
        self.pos += SIGNATURE.len() as u64;
        Ok(())
    }

    /// Writes the image header chunk: dimensions, 8-bit depth, truecolour, and the fixed
    /// compression, filter, and interlace methods.
    pub fn write_ihdr(&mut self, width: u32, height: u32) -> Result<()> {
        let mut payload = [0u8; 13];
        {
            let mut buf = &mut payload[..];
            buf.write_u32::<BigEndian>(width)?;
            buf.write_u32::<BigEndian>(height)?;
        }
        payload[8] = 8; // bit depth
        payload[9] = 2; // colour type: truecolour
        payload[10] = 0; // compression method: deflate
        payload[11] = 0; // filter method: adaptive
        payload[12] = 0; // interlace method: none

        self.write_chunk(b"IHDR", &payload)
    }

    pub fn write_idat(&mut self, payload: &[u8]) -> Result<()> {
        self.write_chunk(b"IDAT", payload)
    }

    pub fn write_iend(&mut self) -> Result<()> {
        self.write_chunk(b"IEND", &[])
    }

    fn write_chunk(&mut self, chunk_type: &[u8; 4], payload: &[u8]) -> Result<()> {
        self.inner.write_u32::<BigEndian>(payload.len() as u32)?;
        self.inner.write_all(chunk_type)?;
        self.inner.write_all(payload)?;

        // The CRC covers the chunk type and payload, not the length.
        let mut crc = Crc32::new();
        crc.process_buf_bytes(chunk_type);
        crc.process_buf_bytes(payload);
        self.inner.write_u32::<BigEndian>(crc.crc())?;

        self.pos += 12 + payload.len() as u64;
        Ok(())
    }
}

/// Builds the IDAT chunk payload: the zlib header, the deflate block, and the big-endian
/// Adler-32 of the uncompressed (filtered) bytes.
pub fn idat_payload(deflate_block: &[u8], adler: u32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(deflate_block.len() + 6);
    payload.extend_from_slice(&ZLIB_HEADER);
    payload.extend_from_slice(deflate_block);
    payload.extend_from_slice(&adler.to_be_bytes());
    payload
}
