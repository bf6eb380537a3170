//! Incremental detection of balanced top-level JSON values.
//!
//! The scanner is an explicit finite-state machine over the buffered bytes. It keeps
//! its position between calls so text appended later is examined exactly once, while
//! an open value that has not closed yet stays in the buffer and keeps its state.

/// Half-open byte range `[start, end)` of one balanced top-level value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub(crate) start: usize,
    pub(crate) end: usize,
}

impl Span {
    pub(crate) fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

/// Scan state carried across buffer appends.
#[derive(Debug, Default, Clone)]
pub(crate) struct BoundaryScanner {
    /// Next byte to examine.
    pos: usize,
    /// Unmatched `{` / `[` inside the open span.
    depth: usize,
    in_string: bool,
    escape: bool,
    /// Offset of the opening character of the span being tracked.
    span_start: Option<usize>,
}

impl BoundaryScanner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Resumes scanning at the stored position and returns the next complete span.
    ///
    /// Text before the first `{` or `[` is skipped, as are stray closers outside any
    /// span. Quotes only switch string mode inside an open span, so prose preceding the
    /// JSON cannot hide a boundary.
    pub(crate) fn next_span(&mut self, text: &str) -> Option<Span> {
        let bytes = text.as_bytes();
        while self.pos < bytes.len() {
            let idx = self.pos;
            let byte = bytes[idx];
            self.pos += 1;

            let Some(start) = self.span_start else {
                if matches!(byte, b'{' | b'[') {
                    self.span_start = Some(idx);
                    self.depth = 1;
                    self.in_string = false;
                    self.escape = false;
                }
                continue;
            };

            if self.in_string {
                if self.escape {
                    self.escape = false;
                } else if byte == b'\\' {
                    self.escape = true;
                } else if byte == b'"' {
                    self.in_string = false;
                }
                continue;
            }

            match byte {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        self.span_start = None;
                        return Some(Span {
                            start,
                            end: idx + 1,
                        });
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Collects every span that is complete in `text`, left to right.
    #[cfg(test)]
    pub(crate) fn scan(&mut self, text: &str) -> Vec<Span> {
        std::iter::from_fn(|| self.next_span(text)).collect()
    }

    /// Offset before which the buffer holds nothing the scanner still needs.
    pub(crate) fn committed(&self) -> usize {
        self.span_start.unwrap_or(self.pos)
    }

    /// Shifts stored offsets after the buffer dropped its first `consumed` bytes.
    pub(crate) fn rebase(&mut self, consumed: usize) {
        self.pos = self.pos.saturating_sub(consumed);
        if let Some(start) = self.span_start.as_mut() {
            *start = start.saturating_sub(consumed);
        }
    }

    /// Whether a value has opened but not yet closed.
    pub(crate) fn has_open_span(&self) -> bool {
        self.span_start.is_some()
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}
