// src/engine/kmer.rs

/// 2-bit code for a nucleotide; `None` for 'N' and anything else.
#[inline]
fn encode_base(b: u8) -> Option<u64> {
    match b {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

/// Rolling iterator over canonical 2-bit k-mers (the smaller of the forward
/// and reverse-complement encodings). Line breaks inside the sequence are
/// skipped; any other non-ACGT byte restarts the window.
pub struct CanonicalKmers<'a> {
    seq: &'a [u8],
    pos: usize,
    k: usize,
    mask: u64,
    fwd: u64,
    rev: u64,
    filled: usize,
}

impl<'a> CanonicalKmers<'a> {
    /// Yields nothing unless `k` is in 1..=32.
    pub fn new(seq: &'a [u8], k: usize) -> Self {
        let mask = if k >= 32 { u64::MAX } else { (1u64 << (2 * k)) - 1 };
        let pos = if (1..=32).contains(&k) { 0 } else { seq.len() };
        Self {
            seq,
            pos,
            k,
            mask,
            fwd: 0,
            rev: 0,
            filled: 0,
        }
    }
}

impl Iterator for CanonicalKmers<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        while self.pos < self.seq.len() {
            let b = self.seq[self.pos];
            self.pos += 1;
            if b == b'\n' || b == b'\r' {
                continue;
            }
            match encode_base(b) {
                Some(code) => {
                    self.fwd = ((self.fwd << 2) | code) & self.mask;
                    self.rev = (self.rev >> 2) | ((3 - code) << (2 * (self.k - 1)));
                    self.filled += 1;
                    if self.filled >= self.k {
                        return Some(self.fwd.min(self.rev));
                    }
                }
                None => {
                    self.filled = 0;
                    self.fwd = 0;
                    self.rev = 0;
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(s: &[u8]) -> u64 {
        s.iter().fold(0, |acc, &b| (acc << 2) | encode_base(b).unwrap())
    }

    #[test]
    fn counts_windows() {
        assert_eq!(CanonicalKmers::new(b"ACGTACGT", 3).count(), 6);
        assert_eq!(CanonicalKmers::new(b"AC", 3).count(), 0);
    }

    #[test]
    fn unsupported_k_yields_nothing() {
        assert_eq!(CanonicalKmers::new(b"ACGTACGT", 0).count(), 0);
        assert_eq!(CanonicalKmers::new(b"ACGTACGT", 40).count(), 0);
        assert_eq!(CanonicalKmers::new(&[b'A'; 40], 32).count(), 9);
    }

    #[test]
    fn ambiguous_base_restarts_window() {
        // ACG | N | TAC -> one k-mer on each side
        assert_eq!(CanonicalKmers::new(b"ACGNTAC", 3).count(), 2);
    }

    #[test]
    fn line_breaks_are_transparent() {
        let joined: Vec<u64> = CanonicalKmers::new(b"ACGTTGCA", 4).collect();
        let wrapped: Vec<u64> = CanonicalKmers::new(b"ACG\nTT\r\nGCA\n", 4).collect();
        assert_eq!(joined, wrapped);
    }

    #[test]
    fn strand_independent() {
        // AACG and its reverse complement CGTT share a canonical form
        let a: Vec<u64> = CanonicalKmers::new(b"AACG", 4).collect();
        let b: Vec<u64> = CanonicalKmers::new(b"CGTT", 4).collect();
        assert_eq!(a, b);
        assert_eq!(a[0], encode(b"AACG").min(encode(b"CGTT")));
    }

    #[test]
    fn lowercase_matches_uppercase() {
        let upper: Vec<u64> = CanonicalKmers::new(b"ACGTTGCA", 5).collect();
        let lower: Vec<u64> = CanonicalKmers::new(b"acgttgca", 5).collect();
        assert_eq!(upper, lower);
    }
}
