// src/lib.rs
pub mod artifact;
pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod scheduler;
pub mod session;
pub mod source;
pub mod transcoder;
pub mod types;

use std::path::Path;

pub use crate::artifact::{Completion, OutputArtifact, RunStats};
pub use crate::channel::{ControlMessage, TranscoderWorker, WorkerEvent};
pub use crate::config::{ReadErrorPolicy, TranscodeConfig, TranscoderOptions};
pub use crate::engine::{ComputeEngine, EngineAdapter, Kernel, RaceKernel};
pub use crate::error::{EngineFault, ErrorKind, TranscodeError};
pub use crate::session::{SessionController, SessionState};
pub use crate::source::{FileSource, InputSource, MemorySource};
pub use crate::transcoder::Transcoder;
pub use crate::types::{InputFormat, ProgressEvent, SubmissionParameters};

/// Downsample one file on the calling thread with the built-in RACE engine.
///
/// Progress is reported through `on_progress` after every buffer-sized
/// chunk. For background execution use `SessionController` or
/// `TranscoderWorker` instead.
pub fn downsample_file<P, F>(
    path: P,
    config: &TranscodeConfig,
    on_progress: F,
) -> Result<OutputArtifact, TranscodeError>
where
    P: AsRef<Path>,
    F: FnMut(ProgressEvent),
{
    config.validate()?;
    let source = FileSource::open(path)?;
    let submission = config.submission(Box::new(source))?;

    Transcoder::new(EngineAdapter::new(RaceKernel::new()), config.transcoder_options())
        .run(submission, on_progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn reads(n: usize) -> String {
        let bases = ["ACGTTGCAAGGCTTAC", "TTGACCGATGCAATCG", "GGCATCGATCGTAGCT"];
        let mut out = String::new();
        for i in 0..n {
            let seq = bases[i % bases.len()];
            out.push_str(&format!("@read{} sample\n{}\n+\n{}\n", i, seq, "I".repeat(seq.len())));
        }
        out
    }

    #[test]
    fn test_downsample_file_api() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("reads.fastq");
        fs::write(&input, reads(30)).expect("Could not write reads.fastq");

        let config = TranscodeConfig {
            capacity_bytes: 100,
            distance_threshold: 2.0,
            kmer_length: 7,
            ..TranscodeConfig::for_input(&input)
        };

        let mut progress = Vec::new();
        let artifact = downsample_file(&input, &config, |e| progress.push(e.percentage))
            .expect("Downsampling failed");

        // three distinct sequences, each allowed through twice before its
        // buckets reach the threshold
        let text = String::from_utf8(artifact.to_vec()).unwrap();
        assert_eq!(text.matches('@').count(), 6);
        assert!(text.starts_with("@read0 sample\n"));
        assert!(artifact.is_complete());

        assert_eq!(progress.last().copied(), Some(100.0));
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));

        let out = dir.path().join(&config.download_filename);
        artifact.persist(&out).expect("Could not write output");
        assert_eq!(fs::read(&out).unwrap(), artifact.to_vec());
    }

    #[test]
    fn test_missing_input_is_io_error() {
        let err = downsample_file("/no/such/reads.fastq", &TranscodeConfig::default(), |_| {})
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
