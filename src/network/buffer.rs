//! Compacted inbound byte buffer.

/// Fixed-capacity buffer with separate read and write cursors.
///
/// Socket reads land after the write cursor; the parser consumes from the
/// read cursor; `compact` slides the unconsumed middle back to the front
/// once a processing round is over, so the write slice regains room
/// without reallocating.
pub(crate) struct InputBuffer {
    data: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
}

impl InputBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self { data: vec![0u8; capacity], read_pos: 0, write_pos: 0 }
    }

    /// Bytes available to the parser.
    pub(crate) fn available_read(&self) -> usize {
        self.write_pos - self.read_pos
    }

    /// Room left for the next socket read.
    pub(crate) fn available_write(&self) -> usize {
        self.data.len() - self.write_pos
    }

    /// The unconsumed bytes.
    pub(crate) fn read_slice(&self) -> &[u8] {
        &self.data[self.read_pos..self.write_pos]
    }

    /// Where the next socket read lands.
    pub(crate) fn write_slice(&mut self) -> &mut [u8] {
        &mut self.data[self.write_pos..]
    }

    /// Marks `n` bytes as consumed by the parser.
    pub(crate) fn consume(&mut self, n: usize) {
        self.read_pos += n;
    }

    /// Marks `n` bytes as filled by a socket read.
    pub(crate) fn extend(&mut self, n: usize) {
        self.write_pos += n;
    }

    /// Slides the unconsumed bytes to the front of the buffer.
    pub(crate) fn compact(&mut self) {
        if self.read_pos > 0 {
            self.data.copy_within(self.read_pos..self.write_pos, 0);
            self.write_pos -= self.read_pos;
            self.read_pos = 0;
        }
    }
}
