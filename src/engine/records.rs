// src/engine/records.rs

use std::ops::Range;

use crate::types::InputFormat;

/// Complete records found at the front of an input region.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RecordScan {
    /// Byte ranges of whole records, in input order.
    pub records: Vec<Range<usize>>,
    /// Bytes that may be dropped from the front of the input: whole records
    /// plus any junk lines skipped between them.
    pub consumed: usize,
    /// Non-blank lines skipped because they did not start a record.
    pub skipped_lines: usize,
}

#[inline]
fn line_end(input: &[u8], from: usize) -> Option<usize> {
    input[from..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|i| from + i + 1)
}

#[inline]
fn is_blank(line: &[u8]) -> bool {
    line.iter().all(|b| b.is_ascii_whitespace())
}

/// Find whole records in `input`. A trailing partial record is left out
/// of `consumed` unless `end_of_stream` is set.
pub fn scan_records(input: &[u8], format: InputFormat, end_of_stream: bool) -> RecordScan {
    let marker = format.record_marker();
    let mut scan = RecordScan::default();
    let mut pos = 0;

    while pos < input.len() {
        if input[pos] != marker {
            // Not a record start: skip the line.
            let end = match line_end(input, pos) {
                Some(end) => end,
                None if end_of_stream => input.len(),
                None => break,
            };
            if !is_blank(&input[pos..end]) {
                scan.skipped_lines += 1;
            }
            pos = end;
            scan.consumed = pos;
            continue;
        }

        let found = match format {
            InputFormat::Fastq => fastq_record_end(input, pos, end_of_stream),
            InputFormat::Fasta => fasta_record_end(input, pos, end_of_stream),
        };
        match found {
            RecordEnd::Complete(end) => {
                scan.records.push(pos..end);
                pos = end;
                scan.consumed = pos;
            }
            RecordEnd::Malformed => {
                scan.skipped_lines += 1;
                scan.consumed = input.len();
                break;
            }
            RecordEnd::NeedMore => break,
        }
    }
    scan
}

enum RecordEnd {
    Complete(usize),
    NeedMore,
    Malformed,
}

/// A FASTQ record is exactly four lines: `@header`, sequence, `+`, quality.
fn fastq_record_end(input: &[u8], start: usize, end_of_stream: bool) -> RecordEnd {
    let mut end = start;
    for line in 0..4 {
        match line_end(input, end) {
            Some(next) => end = next,
            // last quality line without a trailing newline
            None if end_of_stream && line == 3 && end < input.len() => {
                return RecordEnd::Complete(input.len())
            }
            None if end_of_stream => return RecordEnd::Malformed,
            None => return RecordEnd::NeedMore,
        }
    }
    RecordEnd::Complete(end)
}

/// A FASTA record runs from its `>` header up to the next header line.
fn fasta_record_end(input: &[u8], start: usize, end_of_stream: bool) -> RecordEnd {
    let next_header = input[start + 1..]
        .windows(2)
        .position(|w| w == b"\n>")
        .map(|i| start + 1 + i + 1);

    match next_header {
        Some(end) => RecordEnd::Complete(end),
        None if end_of_stream => RecordEnd::Complete(input.len()),
        None => RecordEnd::NeedMore,
    }
}

/// The sequence part of one record. For FASTA this spans every line after
/// the header, line breaks included; k-mer extraction skips them.
pub fn sequence_of(record: &[u8], format: InputFormat) -> &[u8] {
    let header_end = match record.iter().position(|&b| b == b'\n') {
        Some(i) => i + 1,
        None => return &[],
    };
    let rest = &record[header_end..];
    match format {
        InputFormat::Fastq => match rest.iter().position(|&b| b == b'\n') {
            Some(i) => &rest[..i],
            None => rest,
        },
        InputFormat::Fasta => rest,
    }
}
