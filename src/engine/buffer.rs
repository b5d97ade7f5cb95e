// src/engine/buffer.rs

use crate::error::EngineFault;

/// Fixed-capacity input and output regions owned by one engine instance.
///
/// Callers only ever see byte counts and slices; every write is bounds
/// checked against the capacity chosen at `reserve` time.
#[derive(Debug, Default)]
pub struct SharedBuffer {
    input: Vec<u8>,
    /// Bytes at the front of `input` that are live and unconsumed.
    valid: usize,
    /// Bytes of `input` that hold written data (may exceed `valid` only
    /// between `write` and `set_valid`).
    written: usize,
    output: Vec<u8>,
    output_capacity: usize,
    reserved: bool,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate (or reset) both regions.
    pub fn reserve(&mut self, capacity: usize) {
        self.input.clear();
        self.input.resize(capacity, 0);
        self.output.clear();
        self.output.reserve(capacity);
        self.output_capacity = capacity;
        self.valid = 0;
        self.written = 0;
        self.reserved = true;
    }

    pub fn is_reserved(&self) -> bool {
        self.reserved
    }

    pub fn capacity(&self) -> usize {
        self.input.len()
    }

    fn ensure_reserved(&self, operation: &'static str) -> Result<(), EngineFault> {
        if self.reserved {
            Ok(())
        } else {
            Err(EngineFault::NotReserved { operation })
        }
    }

    /// Copy `bytes` in at `offset`, which must be the current valid count so
    /// leftover bytes are never overwritten.
    pub fn write_input(&mut self, bytes: &[u8], offset: usize) -> Result<(), EngineFault> {
        self.ensure_reserved("write_input")?;
        if offset != self.valid {
            return Err(EngineFault::OutOfOrderWrite {
                offset,
                valid: self.valid,
            });
        }
        let end = offset
            .checked_add(bytes.len())
            .filter(|&end| end <= self.capacity())
            .ok_or(EngineFault::InputOverflow {
                offset,
                len: bytes.len(),
                capacity: self.capacity(),
            })?;

        self.input[offset..end].copy_from_slice(bytes);
        self.written = end;
        Ok(())
    }

    pub fn set_valid_input_bytes(&mut self, n: usize) -> Result<(), EngineFault> {
        self.ensure_reserved("set_valid_input_bytes")?;
        if n > self.capacity() {
            return Err(EngineFault::ValidBytesOverflow {
                requested: n,
                capacity: self.capacity(),
            });
        }
        if n > self.written {
            return Err(EngineFault::ValidBytesUnwritten {
                requested: n,
                written: self.written,
            });
        }
        self.valid = n;
        self.written = n;
        Ok(())
    }

    pub fn valid_input_bytes(&self) -> Result<usize, EngineFault> {
        self.ensure_reserved("valid_input_bytes")?;
        Ok(self.valid)
    }

    pub fn valid_input(&self) -> &[u8] {
        &self.input[..self.valid]
    }

    /// Drop the first `consumed` valid bytes and move the remainder to the
    /// front of the input region.
    pub fn compact(&mut self, consumed: usize) -> Result<(), EngineFault> {
        if consumed > self.valid {
            return Err(EngineFault::OverConsumed {
                consumed,
                valid: self.valid,
            });
        }
        self.input.copy_within(consumed..self.valid, 0);
        self.valid -= consumed;
        self.written = self.valid;
        Ok(())
    }

    /// Split borrow for a compute pass: valid input and a cleared output.
    pub fn split_for_process(&mut self) -> (&[u8], &mut Vec<u8>) {
        self.output.clear();
        (&self.input[..self.valid], &mut self.output)
    }

    pub fn check_output(&self) -> Result<(), EngineFault> {
        if self.output.len() > self.output_capacity {
            return Err(EngineFault::OutputOverflow {
                len: self.output.len(),
                capacity: self.output_capacity,
            });
        }
        Ok(())
    }

    pub fn clear_output(&mut self) {
        self.output.clear();
    }

    pub fn output(&self) -> Result<&[u8], EngineFault> {
        self.ensure_reserved("output_bytes")?;
        Ok(&self.output)
    }
}
