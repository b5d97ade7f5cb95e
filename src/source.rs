//src/source.rs

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// A randomly sliceable byte source with a length known up front.
pub trait InputSource: Send {
    /// Total length in bytes, fixed for the lifetime of the source.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read bytes starting at `offset` into `buf`, filling as much of it as
    /// the source has. A short count means the end of the data was reached.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;
}

/// Input backed by a file on disk.
pub struct FileSource {
    file: File,
    len: u64,
}

impl FileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }
}

impl InputSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

/// Input held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl InputSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let start = usize::try_from(offset)
            .unwrap_or(usize::MAX)
            .min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn memory_source_slices() {
        let mut src = MemorySource::new(b"0123456789".to_vec());
        let mut buf = [0u8; 4];

        assert_eq!(src.len(), 10);
        assert_eq!(src.read_at(0, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"0123");
        assert_eq!(src.read_at(8, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"89");
        assert_eq!(src.read_at(10, &mut buf).unwrap(), 0);
        assert_eq!(src.read_at(500, &mut buf).unwrap(), 0);
    }

    #[test]
    fn file_source_reads_windows() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"@r1\nACGT\n+\nIIII\n").unwrap();
        tmp.flush().unwrap();

        let mut src = FileSource::open(tmp.path()).unwrap();
        assert_eq!(src.len(), 16);

        let mut buf = [0u8; 5];
        assert_eq!(src.read_at(4, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"ACGT\n");

        let mut big = [0u8; 64];
        assert_eq!(src.read_at(11, &mut big).unwrap(), 5);
        assert_eq!(&big[..5], b"IIII\n");
    }

    #[test]
    fn file_source_missing_file() {
        assert!(FileSource::open("/definitely/not/here.fastq").is_err());
    }
}
