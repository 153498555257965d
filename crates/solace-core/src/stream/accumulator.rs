//! Capacity-bounded transcript buffer.

/// Collects text deltas up to a byte capacity.
///
/// The delta that crosses the capacity is cut at the last UTF-8 character
/// boundary that fits, and every later delta is discarded.
#[derive(Debug)]
pub struct StreamAccumulator {
    buffer: String,
    truncated: bool,
    capacity_bytes: usize,
}

impl StreamAccumulator {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            buffer: String::new(),
            truncated: false,
            capacity_bytes,
        }
    }

    pub fn append(&mut self, delta: &str) {
        if self.truncated || delta.is_empty() {
            return;
        }

        let remaining = self.capacity_bytes.saturating_sub(self.buffer.len());
        if delta.len() <= remaining {
            self.buffer.push_str(delta);
            return;
        }

        let mut cut = remaining;
        while !delta.is_char_boundary(cut) {
            cut -= 1;
        }
        self.buffer.push_str(&delta[..cut]);
        self.truncated = true;
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Consume the accumulator, returning `(text, truncated)`.
    pub fn finish(self) -> (String, bool) {
        (self.buffer, self.truncated)
    }
}
