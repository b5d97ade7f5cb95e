//src/artifact.rs

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

/// How a run came to an end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Every input byte was read and processed.
    Complete,
    /// Reading stopped early; the artifact holds the output produced up to
    /// `offset`.
    Truncated { offset: u64, reason: String },
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Read -> process -> drain cycles.
    pub cycles: u64,
    pub bytes_read: u64,
    pub bytes_emitted: u64,
    /// Whether a trailing flush pass ran at end of stream.
    pub flushed: bool,
}

/// Output fragments appended in arrival order; never truncated.
#[derive(Debug, Default)]
pub struct AccumulatedOutput {
    fragments: Vec<Vec<u8>>,
    len: usize,
}

impl AccumulatedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one drained fragment, empty ones included.
    pub fn push(&mut self, fragment: &[u8]) {
        self.len += fragment.len();
        self.fragments.push(fragment.to_vec());
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn into_artifact(self, completion: Completion, stats: RunStats) -> OutputArtifact {
        OutputArtifact {
            fragments: self.fragments,
            len: self.len,
            completion,
            stats,
        }
    }
}

/// The finished result of a run, handed to the caller.
#[derive(Debug)]
pub struct OutputArtifact {
    fragments: Vec<Vec<u8>>,
    len: usize,
    completion: Completion,
    stats: RunStats,
}

impl OutputArtifact {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn fragments(&self) -> &[Vec<u8>] {
        &self.fragments
    }

    pub fn completion(&self) -> &Completion {
        &self.completion
    }

    pub fn is_complete(&self) -> bool {
        self.completion == Completion::Complete
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// All fragments concatenated.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for fragment in &self.fragments {
            out.extend_from_slice(fragment);
        }
        out
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for fragment in &self.fragments {
            writer.write_all(fragment)?;
        }
        Ok(())
    }

    /// Write the output to `path`, gzip-compressed if the name ends in `.gz`.
    pub fn persist<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();
        let file = BufWriter::new(File::create(path)?);

        let is_gz = path
            .extension()
            .map(|ext| ext == "gz")
            .unwrap_or(false);

        if is_gz {
            let mut encoder = GzEncoder::new(file, Compression::default());
            self.write_to(&mut encoder)?;
            encoder.finish()?.flush()?;
        } else {
            let mut file = file;
            self.write_to(&mut file)?;
            file.flush()?;
        }
        log::info!("wrote {} byte(s) to {}", self.len, path.display());
        Ok(())
    }
}
