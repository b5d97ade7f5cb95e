//src/scheduler.rs

/// Where the run is in the input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamPosition {
    offset: u64,
    total_size: u64,
}

impl StreamPosition {
    pub fn new(total_size: u64) -> Self {
        Self {
            offset: 0,
            total_size,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn remaining(&self) -> u64 {
        self.total_size.saturating_sub(self.offset)
    }

    pub fn is_complete(&self) -> bool {
        self.offset >= self.total_size
    }

    /// Move forward by the number of bytes actually read; never past the end.
    pub fn advance(&mut self, bytes_read: usize) {
        self.offset = self
            .offset
            .saturating_add(bytes_read as u64)
            .min(self.total_size);
    }

    /// `100 * offset / total`, clamped to [0, 100]. An empty stream is done.
    pub fn percentage(&self) -> f64 {
        if self.total_size == 0 {
            return 100.0;
        }
        (100.0 * self.offset as f64 / self.total_size as f64).clamp(0.0, 100.0)
    }
}

/// Fill level of the engine's input region, as the transcoder observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferState {
    pub capacity_bytes: usize,
    pub valid_input_bytes: usize,
}

impl BufferState {
    pub fn new(capacity_bytes: usize, valid_input_bytes: usize) -> Self {
        Self {
            capacity_bytes,
            valid_input_bytes,
        }
    }

    pub fn free_bytes(&self) -> usize {
        self.capacity_bytes.saturating_sub(self.valid_input_bytes)
    }

    pub fn is_full(&self) -> bool {
        self.valid_input_bytes >= self.capacity_bytes
    }
}

/// The next slice of input to read: `[offset, offset + size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadWindow {
    pub offset: u64,
    pub size: usize,
}

impl ReadWindow {
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn end(&self) -> u64 {
        self.offset + self.size as u64
    }
}

/// Compute the next read window.
///
/// Only the buffer's free region is requested, and the window never runs
/// past the end of the stream. A zero-sized window with input still
/// remaining means the buffer is full and the engine consumed nothing.
pub fn next_window(position: &StreamPosition, buffer: &BufferState) -> ReadWindow {
    let free = buffer.free_bytes() as u64;
    let size = free.min(position.remaining());

    log::debug!(
        "window: offset={} size={} (valid={} capacity={} total={})",
        position.offset(),
        size,
        buffer.valid_input_bytes,
        buffer.capacity_bytes,
        position.total_size()
    );

    ReadWindow {
        offset: position.offset(),
        // bounded by `free`, which came from a usize
        size: size as usize,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_free_region_only() {
        let pos = StreamPosition::new(1_000);
        let window = next_window(&pos, &BufferState::new(100, 30));
        assert_eq!(window, ReadWindow { offset: 0, size: 70 });
    }

    #[test]
    fn clamps_to_end_of_stream() {
        let mut pos = StreamPosition::new(250);
        pos.advance(200);
        let window = next_window(&pos, &BufferState::new(100, 0));
        assert_eq!(window, ReadWindow { offset: 200, size: 50 });
        assert_eq!(window.end(), 250);
    }

    #[test]
    fn full_buffer_yields_empty_window() {
        let pos = StreamPosition::new(1_000);
        let window = next_window(&pos, &BufferState::new(100, 100));
        assert!(window.is_empty());
        assert!(!pos.is_complete());
    }

    #[test]
    fn complete_stream_yields_empty_window() {
        let mut pos = StreamPosition::new(10);
        pos.advance(10);
        assert!(pos.is_complete());
        assert!(next_window(&pos, &BufferState::new(100, 4)).is_empty());
    }

    #[test]
    fn same_state_same_window() {
        let mut pos = StreamPosition::new(12_345);
        pos.advance(4_000);
        let buf = BufferState::new(5_000, 17);
        let first = next_window(&pos, &buf);
        for _ in 0..10 {
            assert_eq!(next_window(&pos, &buf), first);
        }
    }

    #[test]
    fn advance_is_monotonic_and_bounded() {
        let mut pos = StreamPosition::new(100);
        let mut last = pos.offset();
        for step in [0, 10, 0, 60, 50] {
            pos.advance(step);
            assert!(pos.offset() >= last);
            last = pos.offset();
        }
        assert_eq!(pos.offset(), 100);
        assert_eq!(pos.percentage(), 100.0);
    }

    #[test]
    fn percentage_of_empty_stream_is_done() {
        let pos = StreamPosition::new(0);
        assert!(pos.is_complete());
        assert_eq!(pos.percentage(), 100.0);
    }
}
