// src/engine/mod.rs
//
// The compute engine as the transcoder sees it: a fixed-capacity input
// region, an output region, and a `process` step that may leave a leftover.

pub mod buffer;
pub mod kmer;
pub mod race;
pub mod records;

use crate::error::EngineFault;
use crate::types::{InputFormat, MAX_DISTANCE_THRESHOLD, MAX_KMER_LENGTH, MIN_KMER_LENGTH};
use buffer::SharedBuffer;

pub use race::RaceKernel;

/// Default size of the engine's input buffer.
pub const DEFAULT_CAPACITY_BYTES: usize = 5_000_000;

/// Parameters passed through to the engine on every `process` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineParams {
    pub distance_threshold: f32,
    pub format: InputFormat,
    pub kmer_length: u8,
}

impl EngineParams {
    pub fn check(&self) -> Result<(), EngineFault> {
        if !(0.0..MAX_DISTANCE_THRESHOLD).contains(&self.distance_threshold) {
            return Err(EngineFault::InvalidParams(format!(
                "distance threshold {} outside [0, {MAX_DISTANCE_THRESHOLD})",
                self.distance_threshold
            )));
        }
        if !(MIN_KMER_LENGTH..=MAX_KMER_LENGTH).contains(&self.kmer_length) {
            return Err(EngineFault::InvalidParams(format!(
                "k-mer length {} outside [{MIN_KMER_LENGTH}, {MAX_KMER_LENGTH}]",
                self.kmer_length
            )));
        }
        Ok(())
    }
}

/// Call contract of a compute engine. Calls out of order (anything before
/// `reserve`) fail with `EngineFault::NotReserved`.
pub trait ComputeEngine {
    /// Allocate or reset the input and output regions; once per run.
    fn reserve(&mut self, capacity: usize) -> Result<(), EngineFault>;

    /// Copy `bytes` into the input region at `offset`, which must equal the
    /// current valid count.
    fn write_input(&mut self, bytes: &[u8], offset: usize) -> Result<(), EngineFault>;

    fn set_valid_input_bytes(&mut self, n: usize) -> Result<(), EngineFault>;

    fn valid_input_bytes(&self) -> Result<usize, EngineFault>;

    /// One compute pass over the valid input. The unconsumed remainder is
    /// moved to the front of the input region and becomes the new valid count.
    fn process(
        &mut self,
        distance_threshold: f32,
        format: InputFormat,
        kmer_length: u8,
    ) -> Result<(), EngineFault>;

    /// Output produced by the most recent `process` (possibly empty).
    fn output_bytes(&self) -> Result<&[u8], EngineFault>;
}

/// The engine-specific part of a compute pass.
pub trait Kernel {
    /// Drop any state kept from a previous run.
    fn reset(&mut self);

    /// Consume a prefix of `input`, appending produced bytes to `output`,
    /// and return how many input bytes were consumed. `end_of_stream` is
    /// set when no new input arrived since the previous pass, in which case
    /// a trailing partial unit should be flushed.
    fn process(
        &mut self,
        input: &[u8],
        end_of_stream: bool,
        params: &EngineParams,
        output: &mut Vec<u8>,
    ) -> Result<usize, EngineFault>;
}

/// Implements the call contract once on top of a `Kernel`.
pub struct EngineAdapter<K> {
    buffer: SharedBuffer,
    kernel: K,
    fed_since_process: bool,
}

impl<K: Kernel> EngineAdapter<K> {
    pub fn new(kernel: K) -> Self {
        Self {
            buffer: SharedBuffer::new(),
            kernel,
            fed_since_process: false,
        }
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }
}

impl<K: Kernel> ComputeEngine for EngineAdapter<K> {
    fn reserve(&mut self, capacity: usize) -> Result<(), EngineFault> {
        self.buffer.reserve(capacity);
        self.kernel.reset();
        self.fed_since_process = false;
        log::debug!("engine reserved {} bytes", capacity);
        Ok(())
    }

    fn write_input(&mut self, bytes: &[u8], offset: usize) -> Result<(), EngineFault> {
        self.buffer.write_input(bytes, offset)?;
        if !bytes.is_empty() {
            self.fed_since_process = true;
        }
        Ok(())
    }

    fn set_valid_input_bytes(&mut self, n: usize) -> Result<(), EngineFault> {
        self.buffer.set_valid_input_bytes(n)
    }

    fn valid_input_bytes(&self) -> Result<usize, EngineFault> {
        self.buffer.valid_input_bytes()
    }

    fn process(
        &mut self,
        distance_threshold: f32,
        format: InputFormat,
        kmer_length: u8,
    ) -> Result<(), EngineFault> {
        if !self.buffer.is_reserved() {
            return Err(EngineFault::NotReserved { operation: "process" });
        }
        let params = EngineParams {
            distance_threshold,
            format,
            kmer_length,
        };
        params.check()?;
        let end_of_stream = !self.fed_since_process;
        self.fed_since_process = false;

        let (input, output) = self.buffer.split_for_process();
        let valid = input.len();
        let consumed = self.kernel.process(input, end_of_stream, &params, output)?;

        if let Err(fault) = self.buffer.check_output() {
            self.buffer.clear_output();
            return Err(fault);
        }
        self.buffer.compact(consumed)?;

        log::trace!(
            "process: valid={} consumed={} leftover={} eos={}",
            valid,
            consumed,
            valid - consumed,
            end_of_stream
        );
        Ok(())
    }

    fn output_bytes(&self) -> Result<&[u8], EngineFault> {
        self.buffer.output()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Echoes whole lines, keeps a trailing partial line unless flushing.
    struct LineEcho {
        resets: usize,
    }

    impl Kernel for LineEcho {
        fn reset(&mut self) {
            self.resets += 1;
        }

        fn process(
            &mut self,
            input: &[u8],
            end_of_stream: bool,
            _params: &EngineParams,
            output: &mut Vec<u8>,
        ) -> Result<usize, EngineFault> {
            let consumed = if end_of_stream {
                input.len()
            } else {
                input.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1)
            };
            output.extend_from_slice(&input[..consumed]);
            Ok(consumed)
        }
    }

    fn feed(engine: &mut EngineAdapter<LineEcho>, bytes: &[u8]) {
        let valid = engine.valid_input_bytes().unwrap();
        engine.write_input(bytes, valid).unwrap();
        engine.set_valid_input_bytes(valid + bytes.len()).unwrap();
        engine.process(1.0, InputFormat::Fastq, 5).unwrap();
    }

    #[test]
    fn process_before_reserve_faults() {
        let mut engine = EngineAdapter::new(LineEcho { resets: 0 });
        assert!(matches!(
            engine.process(1.0, InputFormat::Fastq, 5),
            Err(EngineFault::NotReserved { operation: "process" })
        ));
    }

    #[test]
    fn out_of_range_params_fault_without_touching_input() {
        let mut engine = EngineAdapter::new(LineEcho { resets: 0 });
        engine.reserve(64).unwrap();
        let record = b"@r\nACGTACGT\n+\nIIIIIIII\n";
        engine.write_input(record, 0).unwrap();
        engine.set_valid_input_bytes(record.len()).unwrap();

        for k in [0u8, 2, 31, 40, u8::MAX] {
            assert!(matches!(
                engine.process(10.0, InputFormat::Fastq, k),
                Err(EngineFault::InvalidParams(_))
            ));
        }
        for tau in [-1.0, 100.0, f32::NAN] {
            assert!(matches!(
                engine.process(tau, InputFormat::Fastq, 14),
                Err(EngineFault::InvalidParams(_))
            ));
        }
        assert_eq!(engine.valid_input_bytes().unwrap(), record.len());
    }

    #[test]
    fn leftover_is_carried_and_flushed() {
        let mut engine = EngineAdapter::new(LineEcho { resets: 0 });
        engine.reserve(32).unwrap();
        assert_eq!(engine.kernel().resets, 1);

        feed(&mut engine, b"one\ntw");
        assert_eq!(engine.output_bytes().unwrap(), b"one\n");
        assert_eq!(engine.valid_input_bytes().unwrap(), 2);

        feed(&mut engine, b"o\nthr");
        assert_eq!(engine.output_bytes().unwrap(), b"two\n");
        assert_eq!(engine.valid_input_bytes().unwrap(), 3);

        // no new bytes: the kernel sees end of stream
        engine.process(1.0, InputFormat::Fastq, 5).unwrap();
        assert_eq!(engine.output_bytes().unwrap(), b"thr");
        assert_eq!(engine.valid_input_bytes().unwrap(), 0);
    }

    #[test]
    fn output_is_replaced_each_pass() {
        let mut engine = EngineAdapter::new(LineEcho { resets: 0 });
        engine.reserve(16).unwrap();
        feed(&mut engine, b"a\n");
        feed(&mut engine, b"partial");
        assert!(engine.output_bytes().unwrap().is_empty());
    }
}
