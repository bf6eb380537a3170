/// Default ceiling for buffered, not-yet-parsed text, in bytes.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 10_000;

/// Reported when an append would push the buffer past its ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BufferOverflow {
    /// Size the buffer would have reached.
    pub(crate) attempted: usize,
    /// Configured ceiling.
    pub(crate) limit: usize,
}

/// Owned text accumulated from upstream chunks.
///
/// Sizes are counted in UTF-8 bytes, the same unit the boundary scanner indexes with.
/// The buffer never holds more than `max_size` bytes: an append that would cross the
/// ceiling discards the whole content instead of truncating it.
#[derive(Debug)]
pub(crate) struct ChunkBuffer {
    text: String,
    max_size: usize,
}

impl ChunkBuffer {
    pub(crate) fn new(max_size: usize) -> Self {
        Self {
            text: String::new(),
            max_size,
        }
    }

    /// Appends a chunk, or clears everything and reports the overflow.
    pub(crate) fn append(&mut self, chunk: &str) -> Result<(), BufferOverflow> {
        let attempted = self.text.len() + chunk.len();
        if attempted > self.max_size {
            self.clear();
            return Err(BufferOverflow {
                attempted,
                limit: self.max_size,
            });
        }
        self.text.push_str(chunk);
        Ok(())
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.text
    }

    pub(crate) fn len(&self) -> usize {
        self.text.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Drops the first `upto` bytes. `upto` always sits on a structural (ASCII) boundary.
    pub(crate) fn consume(&mut self, upto: usize) {
        if upto >= self.text.len() {
            self.text.clear();
        } else if upto > 0 {
            self.text.drain(..upto);
        }
    }

    /// Discards the content and releases its allocation.
    pub(crate) fn clear(&mut self) {
        self.text = String::new();
    }
}
