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

//! Reads the gzip-compressed, whitespace-separated weights file: a
//! format version on line one, then one line per weight tensor in the
//! fixed order (input-conv block, N residual blocks of two conv blocks
//! each, policy head, value head). The residual block count is inferred
//! from how many tensor lines remain once the two heads and the input
//! block are accounted for.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;

use cz_utils::Error;

/// Four tensors per convolution block: weights, biases, batch-norm
/// running means, batch-norm running variances.
const TENSORS_PER_CONV_BLOCK: usize = 4;
/// Input conv block (4) + policy head (conv block + dense weights + dense
/// biases = 6) + value head (conv block + two dense layers = 8).
const FIXED_TENSOR_COUNT: usize = TENSORS_PER_CONV_BLOCK + 6 + 8;
const TENSORS_PER_RESIDUAL_BLOCK: usize = 2 * TENSORS_PER_CONV_BLOCK;

pub struct Weights {
    pub format_version: i32,
    pub num_residual_blocks: usize,
    pub tensors: Vec<Vec<f32>>
}

impl Weights {
    pub fn load(path: &Path) -> Result<Weights, Error> {
        let file = File::open(path)
            .map_err(|err| Error::Configuration(format!("could not open weights file: {}", err)))?;
        let mut lines = BufReader::new(GzDecoder::new(file)).lines();

        let format_version: i32 = lines.next()
            .ok_or_else(|| Error::Configuration("weights file is empty".to_string()))?
            .map_err(|err| Error::Configuration(err.to_string()))?
            .trim()
            .parse()
            .map_err(|_| Error::Configuration("first line is not a valid format version".to_string()))?;

        let mut tensors = Vec::new();

        for line in lines {
            let line = line.map_err(|err| Error::Configuration(err.to_string()))?;
            let values: Result<Vec<f32>, _> = line.split_whitespace().map(str::parse::<f32>).collect();
            let values = values.map_err(|_| Error::Configuration(format!("tensor {} contains a non-numeric value", tensors.len())))?;

            if values.is_empty() {
                continue;
            }

            tensors.push(values);
        }

        if tensors.len() < FIXED_TENSOR_COUNT {
            return Err(Error::Configuration(format!(
                "weights file has {} tensors, expected at least {}",
                tensors.len(), FIXED_TENSOR_COUNT
            )));
        }

        let remainder = tensors.len() - FIXED_TENSOR_COUNT;

        if remainder % TENSORS_PER_RESIDUAL_BLOCK != 0 {
            return Err(Error::Configuration(format!(
                "weights file has {} tensors, which does not divide evenly into whole residual blocks",
                tensors.len()
            )));
        }

        Ok(Weights {
            format_version,
            num_residual_blocks: remainder / TENSORS_PER_RESIDUAL_BLOCK,
            tensors
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn write_fixture(tensor_lines: usize) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut encoder = GzEncoder::new(File::create(file.path()).unwrap(), Compression::fast());

        writeln!(encoder, "1").unwrap();

        for _ in 0..tensor_lines {
            writeln!(encoder, "0.1 0.2 0.3").unwrap();
        }

        encoder.finish().unwrap();
        file
    }

    #[test]
    fn zero_residual_blocks_is_valid() {
        let file = write_fixture(FIXED_TENSOR_COUNT);
        let weights = Weights::load(file.path()).unwrap();

        assert_eq!(weights.num_residual_blocks, 0);
        assert_eq!(weights.format_version, 1);
    }

    #[test]
    fn infers_residual_block_count() {
        let file = write_fixture(FIXED_TENSOR_COUNT + 3 * TENSORS_PER_RESIDUAL_BLOCK);
        let weights = Weights::load(file.path()).unwrap();

        assert_eq!(weights.num_residual_blocks, 3);
    }

    #[test]
    fn rejects_truncated_file() {
        let file = write_fixture(FIXED_TENSOR_COUNT - 1);

        assert!(Weights::load(file.path()).is_err());
    }

    #[test]
    fn rejects_misaligned_residual_tensor_count() {
        let file = write_fixture(FIXED_TENSOR_COUNT + 3);

        assert!(Weights::load(file.path()).is_err());
    }

    #[test]
    fn rejects_missing_file() {
        let result = Weights::load(Path::new("/nonexistent/weights.gz"));

        assert!(result.is_err());
    }
}
