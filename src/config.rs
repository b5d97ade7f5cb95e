//src/config.rs

use std::path::Path;

use crate::engine::DEFAULT_CAPACITY_BYTES;
use crate::error::TranscodeError;
use crate::source::InputSource;
use crate::types::{validate_engine_params, InputFormat, SubmissionParameters};

/// What to do when the input source fails part way through a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadErrorPolicy {
    /// End the run with `Finished`, carrying the output produced so far.
    #[default]
    FlushPartial,
    /// End the run with `Error(Read, ..)` and no output.
    Fail,
}

/// Settings for the transcoder itself, fixed for the lifetime of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscoderOptions {
    pub capacity_bytes: usize,
    pub read_error_policy: ReadErrorPolicy,
}

impl Default for TranscoderOptions {
    fn default() -> Self {
        Self {
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
            read_error_policy: ReadErrorPolicy::default(),
        }
    }
}

/// Full configuration for a downsampling session.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeConfig {
    pub capacity_bytes: usize,
    pub distance_threshold: f32,
    pub format: InputFormat,
    pub kmer_length: u8,
    pub download_filename: String,
    pub read_error_policy: ReadErrorPolicy,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
            distance_threshold: 10.0,
            format: InputFormat::Fastq,
            kmer_length: 14,
            download_filename: "file.fastq".to_string(),
            read_error_policy: ReadErrorPolicy::FlushPartial,
        }
    }
}

impl TranscodeConfig {
    /// Defaults, with the format guessed from the input file name.
    pub fn for_input<P: AsRef<Path>>(path: P) -> Self {
        let format = InputFormat::from_path(&path);
        let download_filename = match format {
            InputFormat::Fastq => "file.fastq",
            InputFormat::Fasta => "file.fasta",
        };
        Self {
            format,
            download_filename: download_filename.to_string(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), TranscodeError> {
        if self.capacity_bytes == 0 {
            return Err(TranscodeError::InvalidSubmission(
                "buffer capacity must be positive".to_string(),
            ));
        }
        if self.download_filename.trim().is_empty() {
            return Err(TranscodeError::InvalidSubmission(
                "download file name is empty".to_string(),
            ));
        }
        validate_engine_params(self.distance_threshold, self.kmer_length)
    }

    pub fn transcoder_options(&self) -> TranscoderOptions {
        TranscoderOptions {
            capacity_bytes: self.capacity_bytes,
            read_error_policy: self.read_error_policy,
        }
    }

    /// Package `source` with this configuration's engine parameters.
    pub fn submission(&self, source: Box<dyn InputSource>) -> Result<SubmissionParameters, TranscodeError> {
        SubmissionParameters::new(source, self.distance_threshold, self.format, self.kmer_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    #[test]
    fn defaults_are_valid() {
        let config = TranscodeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.capacity_bytes, 5_000_000);
        assert_eq!(config.kmer_length, 14);
        assert_eq!(config.download_filename, "file.fastq");
    }

    #[test]
    fn for_input_picks_format() {
        let config = TranscodeConfig::for_input("contigs.fa");
        assert_eq!(config.format, InputFormat::Fasta);
        assert_eq!(config.download_filename, "file.fasta");
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = TranscodeConfig::default();
        config.capacity_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = TranscodeConfig::default();
        config.kmer_length = 40;
        assert!(config.validate().is_err());

        let mut config = TranscodeConfig::default();
        config.download_filename = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn builds_submission() {
        let config = TranscodeConfig::default();
        let params = config
            .submission(Box::new(MemorySource::new(vec![0; 10])))
            .unwrap();
        assert_eq!(params.kmer_length(), 14);
        assert_eq!(params.total_size(), 10);
    }
}
