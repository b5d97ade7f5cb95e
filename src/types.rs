//src/types.rs

use std::fmt;
use std::path::Path;

use crate::error::TranscodeError;
use crate::source::InputSource;

/// Smallest and largest k-mer length the engine accepts.
pub const MIN_KMER_LENGTH: u8 = 3;
pub const MAX_KMER_LENGTH: u8 = 30;

/// Upper bound (exclusive) of the distance threshold.
pub const MAX_DISTANCE_THRESHOLD: f32 = 100.0;

/// Record layout of the input stream. The discriminants match the integer
/// tags the engine has always been called with (0 = FASTQ, 1 = FASTA).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputFormat {
    #[default]
    Fastq = 0,
    Fasta = 1,
}

impl InputFormat {
    /// Guess the format from a file name; anything that doesn't look like
    /// FASTA is treated as FASTQ.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let name = path
            .as_ref()
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let name = name.strip_suffix(".gz").unwrap_or(&name);

        if [".fa", ".fasta", ".fna", ".fas"]
            .iter()
            .any(|ext| name.ends_with(ext))
        {
            InputFormat::Fasta
        } else {
            InputFormat::Fastq
        }
    }

    /// First byte of every record in this format.
    pub fn record_marker(self) -> u8 {
        match self {
            InputFormat::Fastq => b'@',
            InputFormat::Fasta => b'>',
        }
    }
}

impl TryFrom<u8> for InputFormat {
    type Error = TranscodeError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(InputFormat::Fastq),
            1 => Ok(InputFormat::Fasta),
            other => Err(TranscodeError::InvalidSubmission(format!(
                "unknown input format tag {other}"
            ))),
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputFormat::Fastq => f.write_str("FASTQ"),
            InputFormat::Fasta => f.write_str("FASTA"),
        }
    }
}

/// Check the engine parameters against their accepted ranges.
pub fn validate_engine_params(distance_threshold: f32, kmer_length: u8) -> Result<(), TranscodeError> {
    if !(0.0..MAX_DISTANCE_THRESHOLD).contains(&distance_threshold) {
        return Err(TranscodeError::InvalidSubmission(format!(
            "distance threshold {distance_threshold} outside [0, {MAX_DISTANCE_THRESHOLD})"
        )));
    }
    if !(MIN_KMER_LENGTH..=MAX_KMER_LENGTH).contains(&kmer_length) {
        return Err(TranscodeError::InvalidSubmission(format!(
            "k-mer length {kmer_length} outside [{MIN_KMER_LENGTH}, {MAX_KMER_LENGTH}]"
        )));
    }
    Ok(())
}

/// Everything one run needs. Built once per user action and consumed by the
/// transcoder; there is no way to construct one with out-of-range parameters.
pub struct SubmissionParameters {
    source: Box<dyn InputSource>,
    distance_threshold: f32,
    format: InputFormat,
    kmer_length: u8,
}

impl SubmissionParameters {
    pub fn new(
        source: Box<dyn InputSource>,
        distance_threshold: f32,
        format: InputFormat,
        kmer_length: u8,
    ) -> Result<Self, TranscodeError> {
        validate_engine_params(distance_threshold, kmer_length)?;
        Ok(Self {
            source,
            distance_threshold,
            format,
            kmer_length,
        })
    }

    pub fn total_size(&self) -> u64 {
        self.source.len()
    }

    pub fn distance_threshold(&self) -> f32 {
        self.distance_threshold
    }

    pub fn format(&self) -> InputFormat {
        self.format
    }

    pub fn kmer_length(&self) -> u8 {
        self.kmer_length
    }

    pub(crate) fn into_parts(self) -> (Box<dyn InputSource>, f32, InputFormat, u8) {
        (self.source, self.distance_threshold, self.format, self.kmer_length)
    }
}

impl fmt::Debug for SubmissionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionParameters")
            .field("total_size", &self.source.len())
            .field("distance_threshold", &self.distance_threshold)
            .field("format", &self.format)
            .field("kmer_length", &self.kmer_length)
            .finish()
    }
}

/// Stream progress after a chunk has been processed, in percent of the
/// input consumed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEvent {
    pub percentage: f64,
    pub offset: u64,
    pub total_size: u64,
}
