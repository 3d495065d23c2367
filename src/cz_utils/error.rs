// Copyright 2019 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;

/// The error kinds the core can surface, per the error handling design --
/// configuration errors are fatal at startup, the others are recoverable
/// (the caller gets a best-move-so-far instead of a crash).
#[derive(Debug, Clone)]
pub enum Error {
    /// A malformed or missing weights file, or an unknown backend name.
    Configuration(String),

    /// The network (or its multiplexer) failed to complete a batch, e.g.
    /// backend exception or accelerator out-of-memory.
    Network(String),

    /// A position or move supplied across the external boundary was
    /// rejected before search was entered.
    Position(String),

    /// The search ran out of arena space for new nodes.
    ResourceExhausted
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Configuration(ref reason) => write!(fmt, "configuration error: {}", reason),
            Error::Network(ref reason) => write!(fmt, "network error: {}", reason),
            Error::Position(ref reason) => write!(fmt, "illegal position: {}", reason),
            Error::ResourceExhausted => write!(fmt, "search arena exhausted")
        }
    }
}

impl std::error::Error for Error { }

pub type Result<T> = ::std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_reason() {
        let err = Error::Configuration("empty weights file".to_string());

        assert_eq!(err.to_string(), "configuration error: empty weights file");
    }
}
