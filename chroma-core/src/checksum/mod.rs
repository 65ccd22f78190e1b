// Chroma
// Copyright (c) 2024 The Project Chroma Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `checksum` module provides implementations of common error-detecting codes.

mod adler32;
mod crc32;

pub use adler32::{adler32, adler32_combine, adler32_simd, Adler32};
pub use crc32::{crc32, Crc32};
