// Chroma
// Copyright (c) 2024 The Project Chroma Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error;
use std::fmt;
use std::io;
use std::result;

/// `Error` provides an enumeration of all possible errors reported by Chroma.
#[derive(Debug)]
pub enum Error {
    /// The caller provided parameters that are malformed or inconsistent with each other.
    InvalidInput(&'static str),
    /// An IO error occurred while writing to the output sink. The output is left as-is; no repair
    /// of partially written data is attempted.
    IoError(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::InvalidInput(msg) => {
                write!(f, "invalid input: {}", msg)
            }
            Error::IoError(ref err) => {
                write!(f, "io error: {}", err)
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::IoError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create an invalid input error.
pub fn invalid_input_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::InvalidInput(msg))
}
