// src/engine/race.rs
//
// Diversity downsampling with a RACE sketch (repeated arrays of counts,
// indexed by a locality-sensitive hash). Each record is hashed into one
// bucket per row via MinHash over its canonical k-mers; the mean count over
// those buckets estimates how many similar records were already seen. A
// record is kept when that estimate is below the distance threshold, and is
// added to the sketch either way.

use ahash::RandomState;
use rayon::prelude::*;

use super::kmer::CanonicalKmers;
use super::records::{scan_records, sequence_of};
use super::{EngineParams, Kernel};
use crate::error::EngineFault;

/// Number of independent hash rows in the sketch.
pub const SKETCH_ROWS: usize = 10;
/// Buckets per row.
pub const SKETCH_RANGE: usize = 1_000;

/// Per-row seeds; fixed so a run is reproducible.
fn row_hasher(row: usize) -> RandomState {
    let r = row as u64;
    RandomState::with_seeds(
        0x9e37_79b9_7f4a_7c15 ^ r,
        0xbf58_476d_1ce4_e5b9_u64.wrapping_mul(r + 1),
        0x94d0_49bb_1331_11eb_u64.wrapping_add(r),
        0x2545_f491_4f6c_dd1d ^ (r << 32),
    )
}

pub struct RaceSketch {
    counts: Vec<u32>,
    hashers: Vec<RandomState>,
    range: usize,
}

impl RaceSketch {
    /// A zero `range` is raised to one bucket per row.
    pub fn new(rows: usize, range: usize) -> Self {
        let range = range.max(1);
        Self {
            counts: vec![0; rows * range],
            hashers: (0..rows).map(row_hasher).collect(),
            range,
        }
    }

    pub fn rows(&self) -> usize {
        self.hashers.len()
    }

    pub fn clear(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = 0);
    }

    /// One bucket per row, or `None` if `kmers` is empty.
    pub fn buckets<I: IntoIterator<Item = u64>>(&self, kmers: I) -> Option<Vec<usize>> {
        let mut mins = vec![u64::MAX; self.rows()];
        let mut any = false;
        for kmer in kmers {
            any = true;
            for (min, hasher) in mins.iter_mut().zip(&self.hashers) {
                let h = hasher.hash_one(kmer);
                if h < *min {
                    *min = h;
                }
            }
        }
        if !any {
            return None;
        }
        Some(
            mins.into_iter()
                .map(|m| (m % self.range as u64) as usize)
                .collect(),
        )
    }

    /// Mean count over the record's buckets.
    pub fn query(&self, buckets: &[usize]) -> f32 {
        let total: u64 = buckets
            .iter()
            .enumerate()
            .map(|(row, &b)| self.counts[row * self.range + b] as u64)
            .sum();
        total as f32 / buckets.len().max(1) as f32
    }

    pub fn insert(&mut self, buckets: &[usize]) {
        for (row, &b) in buckets.iter().enumerate() {
            let cell = &mut self.counts[row * self.range + b];
            *cell = cell.saturating_add(1);
        }
    }
}

/// The downsampling kernel driven through `EngineAdapter`.
pub struct RaceKernel {
    sketch: RaceSketch,
    records_seen: u64,
    records_kept: u64,
}

impl Default for RaceKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl RaceKernel {
    pub fn new() -> Self {
        Self::with_dimensions(SKETCH_ROWS, SKETCH_RANGE)
    }

    pub fn with_dimensions(rows: usize, range: usize) -> Self {
        Self {
            sketch: RaceSketch::new(rows, range),
            records_seen: 0,
            records_kept: 0,
        }
    }

    pub fn records_seen(&self) -> u64 {
        self.records_seen
    }

    pub fn records_kept(&self) -> u64 {
        self.records_kept
    }
}

impl Kernel for RaceKernel {
    fn reset(&mut self) {
        self.sketch.clear();
        self.records_seen = 0;
        self.records_kept = 0;
    }

    fn process(
        &mut self,
        input: &[u8],
        end_of_stream: bool,
        params: &EngineParams,
        output: &mut Vec<u8>,
    ) -> Result<usize, EngineFault> {
        let scan = scan_records(input, params.format, end_of_stream);
        if scan.skipped_lines > 0 {
            log::warn!(
                "skipped {} line(s) that do not start a {} record",
                scan.skipped_lines,
                params.format
            );
        }

        let k = params.kmer_length as usize;
        let sketch = &self.sketch;
        let signatures: Vec<Option<Vec<usize>>> = scan
            .records
            .par_iter()
            .map(|span| {
                let seq = sequence_of(&input[span.clone()], params.format);
                sketch.buckets(CanonicalKmers::new(seq, k))
            })
            .collect();

        let mut kept = 0u64;
        for (span, signature) in scan.records.iter().zip(signatures) {
            let keep = match signature {
                Some(buckets) => {
                    let estimate = self.sketch.query(&buckets);
                    self.sketch.insert(&buckets);
                    estimate < params.distance_threshold
                }
                // too short or all ambiguous: nothing to compare against
                None => true,
            };
            if keep {
                output.extend_from_slice(&input[span.clone()]);
                kept += 1;
            }
        }

        self.records_seen += scan.records.len() as u64;
        self.records_kept += kept;
        log::debug!(
            "race: {} record(s), kept {}, consumed {} of {} bytes",
            scan.records.len(),
            kept,
            scan.consumed,
            input.len()
        );
        Ok(scan.consumed)
    }
}
