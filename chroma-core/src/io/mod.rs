// Chroma
// Copyright (c) 2024 The Project Chroma Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `io` module implements composable bit- and byte-level output.
//!
//! A `Sink` accumulates data into a growable in-memory buffer. Byte-oriented consumers that
//! observe data as it is produced, such as checksums, implement the [`Monitor`] trait.

mod bit;

pub use bit::BitSink;

/// A `Monitor` provides a common interface for observers of a byte sequence, such as checksum
/// algorithms, that process bytes one-at-a-time or in slices.
pub trait Monitor {
    fn process_byte(&mut self, byte: u8);

    fn process_buf_bytes(&mut self, buf: &[u8]);
}
