//src/transcoder.rs

use std::io;

use crate::artifact::{AccumulatedOutput, Completion, OutputArtifact, RunStats};
use crate::config::{ReadErrorPolicy, TranscoderOptions};
use crate::engine::ComputeEngine;
use crate::error::{EngineFault, TranscodeError};
use crate::scheduler::{next_window, BufferState, ReadWindow, StreamPosition};
use crate::source::InputSource;
use crate::types::{InputFormat, ProgressEvent, SubmissionParameters};

/// Where a run is in its read -> process -> drain cycle.
#[derive(Debug)]
pub enum TranscoderState {
    Idle,
    Reading,
    Processing,
    Draining,
    Finished,
    Terminal,
    /// Carries the error that ended the run.
    Failed(TranscodeError),
}

/// Drives one run of a compute engine over an input source.
///
/// The transcoder owns its engine and consumes itself on `run`, so an
/// engine never outlives the run it was reserved for.
pub struct Transcoder<E> {
    engine: E,
    options: TranscoderOptions,
}

/// Loop-carried state of a run.
struct RunCursor {
    position: StreamPosition,
    output: AccumulatedOutput,
    stats: RunStats,
    completion: Completion,
    scratch: Vec<u8>,
    /// Bytes read in the current cycle.
    fresh: usize,
    /// Set once the trailing end-of-stream pass has started.
    flushing: bool,
}

impl<E: ComputeEngine> Transcoder<E> {
    pub fn new(engine: E, options: TranscoderOptions) -> Self {
        Self { engine, options }
    }

    /// Run the submission to completion, calling `on_progress` after every
    /// chunk. Returns the accumulated output; read failures under
    /// `ReadErrorPolicy::FlushPartial` still return `Ok` with a truncated
    /// artifact.
    pub fn run<F>(mut self, submission: SubmissionParameters, mut on_progress: F) -> Result<OutputArtifact, TranscodeError>
    where
        F: FnMut(ProgressEvent),
    {
        let (mut source, distance_threshold, format, kmer_length) = submission.into_parts();
        let params = (distance_threshold, format, kmer_length);

        log::info!(
            "run started: {} bytes of {}, tau={}, k={}, buffer={} bytes",
            source.len(),
            format,
            distance_threshold,
            kmer_length,
            self.options.capacity_bytes
        );

        let mut cursor = RunCursor {
            position: StreamPosition::new(source.len()),
            output: AccumulatedOutput::new(),
            stats: RunStats::default(),
            completion: Completion::Complete,
            scratch: Vec::new(),
            fresh: 0,
            flushing: false,
        };

        match self.drive(source.as_mut(), params, &mut cursor, &mut on_progress) {
            Ok(()) => {
                log::info!(
                    "run finished: {} cycle(s), {} bytes read, {} bytes emitted{}",
                    cursor.stats.cycles,
                    cursor.stats.bytes_read,
                    cursor.stats.bytes_emitted,
                    if cursor.stats.flushed { ", flushed" } else { "" }
                );
                Ok(cursor.output.into_artifact(cursor.completion, cursor.stats))
            }
            Err(e) => {
                log::error!("run failed after {} cycle(s): {}", cursor.stats.cycles, e);
                Err(e)
            }
        }
    }

    fn drive<F>(
        &mut self,
        source: &mut dyn InputSource,
        params: (f32, InputFormat, u8),
        cursor: &mut RunCursor,
        on_progress: &mut F,
    ) -> Result<(), TranscodeError>
    where
        F: FnMut(ProgressEvent),
    {
        let mut state = TranscoderState::Idle;
        loop {
            log::trace!("transcoder: {:?}", state);
            state = match state {
                TranscoderState::Finished => TranscoderState::Terminal,
                TranscoderState::Terminal => return Ok(()),
                TranscoderState::Failed(e) => return Err(e),
                active => self
                    .step(active, source, params, cursor, on_progress)
                    .unwrap_or_else(TranscoderState::Failed),
            };
        }
    }

    /// One transition out of an active state.
    fn step<F>(
        &mut self,
        state: TranscoderState,
        source: &mut dyn InputSource,
        (distance_threshold, format, kmer_length): (f32, InputFormat, u8),
        cursor: &mut RunCursor,
        on_progress: &mut F,
    ) -> Result<TranscoderState, TranscodeError>
    where
        F: FnMut(ProgressEvent),
    {
        let capacity = self.options.capacity_bytes;
        let next = match state {
            TranscoderState::Idle => {
                self.engine.reserve(capacity)?;
                self.engine.set_valid_input_bytes(0)?;
                if cursor.position.total_size() == 0 {
                    on_progress(progress(&cursor.position));
                }
                TranscoderState::Reading
            }

            TranscoderState::Reading => {
                let valid = self.engine.valid_input_bytes()?;
                if cursor.position.is_complete() {
                    if valid > 0 && !cursor.flushing {
                        // one last pass over the leftover with no new input
                        cursor.flushing = true;
                        cursor.fresh = 0;
                        TranscoderState::Processing
                    } else {
                        TranscoderState::Finished
                    }
                } else {
                    let window = next_window(&cursor.position, &BufferState::new(capacity, valid));
                    if window.is_empty() {
                        return Err(EngineFault::Stalled { capacity }.into());
                    }
                    match read_window(source, window, cursor) {
                        Ok(n) => {
                            cursor.fresh = n;
                            TranscoderState::Processing
                        }
                        Err(source_err) => self.on_read_error(window, source_err, cursor)?,
                    }
                }
            }

            TranscoderState::Processing => {
                let valid = self.engine.valid_input_bytes()?;
                let fresh = &cursor.scratch[..cursor.fresh];
                self.engine.write_input(fresh, valid)?;
                self.engine.set_valid_input_bytes(valid + fresh.len())?;
                self.engine.process(distance_threshold, format, kmer_length)?;
                TranscoderState::Draining
            }

            TranscoderState::Draining => {
                let fragment = self.engine.output_bytes()?;
                cursor.stats.bytes_emitted += fragment.len() as u64;
                cursor.output.push(fragment);
                cursor.stats.cycles += 1;

                if cursor.flushing {
                    cursor.stats.flushed = true;
                } else {
                    cursor.position.advance(cursor.fresh);
                    cursor.stats.bytes_read += cursor.fresh as u64;
                    on_progress(progress(&cursor.position));
                }
                TranscoderState::Reading
            }

            done => done,
        };
        Ok(next)
    }

    fn on_read_error(
        &self,
        window: ReadWindow,
        err: io::Error,
        cursor: &mut RunCursor,
    ) -> Result<TranscoderState, TranscodeError> {
        match self.options.read_error_policy {
            ReadErrorPolicy::FlushPartial => {
                log::warn!(
                    "read failed at offset {}: {}; finishing with {} byte(s) of partial output",
                    window.offset,
                    err,
                    cursor.output.len()
                );
                cursor.completion = Completion::Truncated {
                    offset: window.offset,
                    reason: err.to_string(),
                };
                Ok(TranscoderState::Finished)
            }
            ReadErrorPolicy::Fail => Err(TranscodeError::Read {
                offset: window.offset,
                source: err,
            }),
        }
    }
}

/// Read `window` into the cursor's scratch buffer. A short read is fine at
/// the end of the data; an empty one before the reported length is not.
fn read_window(source: &mut dyn InputSource, window: ReadWindow, cursor: &mut RunCursor) -> io::Result<usize> {
    cursor.scratch.resize(window.size, 0);
    let n = source.read_at(window.offset, &mut cursor.scratch[..window.size])?;
    if n == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "input ended at offset {} before its reported length {}",
                window.offset,
                cursor.position.total_size()
            ),
        ));
    }
    log::debug!("read {} of {} requested byte(s) at offset {}", n, window.size, window.offset);
    Ok(n)
}

fn progress(position: &StreamPosition) -> ProgressEvent {
    ProgressEvent {
        percentage: position.percentage(),
        offset: position.offset(),
        total_size: position.total_size(),
    }
}
