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

//! Writes a finished game's training records to a gzip-compressed chunk,
//! one file per game, in the exact concatenated fixed-size-record format
//! downstream trainers read.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::record::TrainingRecord;

/// Serializes `records` (in the order they were sampled) to `path` as a
/// gzip-compressed concatenation of fixed-size V3 records.
pub fn write_chunk(path: &Path, records: &[TrainingRecord]) -> io::Result<()> {
    let file = File::create(path)?;
    let mut encoder = GzEncoder::new(file, Compression::default());

    for record in records {
        encoder.write_all(&record.encode())?;
    }

    encoder.finish()?;
    Ok(())
}

/// Reads back a chunk written by `write_chunk`. Used only by this crate's
/// own round-trip tests -- the external trainer is the real consumer.
pub fn read_chunk(path: &Path) -> io::Result<Vec<TrainingRecord>> {
    use flate2::read::GzDecoder;
    use std::io::Read;

    let file = File::open(path)?;
    let mut decoder = GzDecoder::new(file);
    let mut bytes = Vec::new();

    decoder.read_to_end(&mut bytes)?;

    let mut records = Vec::with_capacity(bytes.len() / crate::record::RECORD_SIZE);

    for chunk in bytes.chunks(crate::record::RECORD_SIZE) {
        match TrainingRecord::decode(chunk) {
            Some(record) => records.push(record),
            None => return Err(io::Error::new(io::ErrorKind::InvalidData, "malformed training record"))
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cz_position::{Color, MOVE_SPACE};
    use tempfile::NamedTempFile;

    fn record(result: i8) -> TrainingRecord {
        TrainingRecord {
            policy: [0.0f32; MOVE_SPACE],
            planes: [0u64; 104],
            castling: [true, true, true, true],
            side_to_move: Color::White,
            rule50: 0,
            result
        }
    }

    #[test]
    fn round_trips_through_gzip() {
        let records = vec![record(1), record(1), record(-1)];
        let file = NamedTempFile::new().unwrap();

        write_chunk(file.path(), &records).unwrap();
        let back = read_chunk(file.path()).unwrap();

        assert_eq!(back, records);
    }

    #[test]
    fn record_count_matches_move_count() {
        let records: Vec<TrainingRecord> = (0..12).map(|_| record(0)).collect();
        let file = NamedTempFile::new().unwrap();

        write_chunk(file.path(), &records).unwrap();
        let back = read_chunk(file.path()).unwrap();

        assert_eq!(back.len(), 12);
    }
}
