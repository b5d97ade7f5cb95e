//src/error.rs

use std::io;
use thiserror::Error;

/// Violations of the compute engine's call protocol or buffer capacity.
/// Always fatal for the run that raised it.
#[derive(Debug, Error)]
pub enum EngineFault {
    #[error("`{operation}` called before `reserve`")]
    NotReserved { operation: &'static str },

    #[error("write at offset {offset} does not append after {valid} live bytes")]
    OutOfOrderWrite { offset: usize, valid: usize },

    #[error("writing {len} bytes at offset {offset} overflows the {capacity}-byte input buffer")]
    InputOverflow {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    #[error("{requested} valid input bytes exceed the {capacity}-byte input buffer")]
    ValidBytesOverflow { requested: usize, capacity: usize },

    #[error("{requested} valid input bytes claimed but only {written} were written")]
    ValidBytesUnwritten { requested: usize, written: usize },

    #[error("input buffer full ({capacity} bytes) and the engine consumed nothing")]
    Stalled { capacity: usize },

    #[error("engine reported consuming {consumed} of {valid} valid bytes")]
    OverConsumed { consumed: usize, valid: usize },

    #[error("{len} output bytes exceed the {capacity}-byte output buffer")]
    OutputOverflow { len: usize, capacity: usize },

    #[error("invalid engine parameters: {0}")]
    InvalidParams(String),
}

/// Everything a run or a channel operation can fail with.
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("read failed at offset {offset}: {source}")]
    Read {
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error("engine fault: {0}")]
    Engine(#[from] EngineFault),

    #[error("a run is already active on this channel")]
    Busy,

    #[error("invalid submission: {0}")]
    InvalidSubmission(String),

    #[error("transcoder worker is no longer running")]
    Disconnected,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Flat discriminant carried by `WorkerEvent::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Read,
    EngineFault,
    Busy,
    InvalidSubmission,
    Disconnected,
    Io,
}

impl TranscodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TranscodeError::Read { .. } => ErrorKind::Read,
            TranscodeError::Engine(_) => ErrorKind::EngineFault,
            TranscodeError::Busy => ErrorKind::Busy,
            TranscodeError::InvalidSubmission(_) => ErrorKind::InvalidSubmission,
            TranscodeError::Disconnected => ErrorKind::Disconnected,
            TranscodeError::Io(_) => ErrorKind::Io,
        }
    }
}
