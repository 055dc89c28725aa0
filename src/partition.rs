//! Size-bounded grouping of rendered fragments into message parts.
//!
//! The robot endpoint rejects messages whose payload exceeds its limit
//! (`errcode 40058`), so a batch is cut into consecutive parts. Every part
//! starts with its own header and carries whole fragments only: a fragment
//! is never split across parts, and fragment order is preserved.
//!
//! Size is measured in bytes of the serialized wire envelope. Since JSON
//! escaping is per character, the running size is tracked incrementally
//! instead of re-serializing the accumulated text on each step.

use crate::relay::{envelope_overhead, escaped_len};

/// Default bound on a part's envelope, in bytes.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 4096;

/// One independently sent message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePart {
    /// 1-based position within the batch.
    pub sequence_index: usize,
    /// Header line this part starts with.
    pub header: String,
    /// Full markdown content: the header followed by the fragments.
    pub text: String,
    /// Number of fragments after the header.
    pub fragment_count: usize,
    /// Serialized envelope size in bytes.
    pub envelope_bytes: usize,
}

impl MessagePart {
    /// The fragment content, without the header.
    pub fn body(&self) -> &str {
        &self.text[self.header.len()..]
    }
}

/// Splits fragments into parts whose envelope stays within `max_bytes`.
#[derive(Debug, Clone)]
pub struct Partitioner {
    max_bytes: usize,
    overhead: usize,
}

impl Partitioner {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            overhead: envelope_overhead(),
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Envelope size of a message carrying `text`.
    pub fn envelope_len(&self, text: &str) -> usize {
        self.overhead + escaped_len(text)
    }

    /// Group `fragments` into parts.
    ///
    /// `header_for` renders the header of part `n` (1-based); it is called
    /// once per part, in order. A fragment that does not fit in the current
    /// part opens the next one. A fragment that does not fit even in a
    /// fresh part is still sent whole, as an oversized part.
    ///
    /// Only a part that already holds a fragment is closed early. An
    /// oversized first fragment therefore shares Part1 with its header
    /// rather than leaving a header-only Part1 in front of it.
    ///
    /// Always returns at least one part: an empty batch yields the header
    /// alone.
    pub fn partition<F, E>(
        &self,
        fragments: &[String],
        mut header_for: F,
    ) -> Result<Vec<MessagePart>, E>
    where
        F: FnMut(usize) -> Result<String, E>,
    {
        let mut parts = Vec::new();
        let mut current = Accumulator::open(1, header_for(1)?, self);

        for fragment in fragments {
            let fragment_bytes = escaped_len(fragment);

            if current.fragment_count > 0 && current.bytes + fragment_bytes > self.max_bytes {
                let next = current.sequence_index + 1;
                parts.push(current.close(self.max_bytes));
                current = Accumulator::open(next, header_for(next)?, self);
            }

            current.push(fragment, fragment_bytes);
        }

        parts.push(current.close(self.max_bytes));

        tracing::debug!(
            fragments = fragments.len(),
            parts = parts.len(),
            max_bytes = self.max_bytes,
            "Batch partitioned"
        );

        Ok(parts)
    }
}

impl Default for Partitioner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_BYTES)
    }
}

/// Part under construction.
struct Accumulator {
    sequence_index: usize,
    header_len: usize,
    text: String,
    fragment_count: usize,
    bytes: usize,
}

impl Accumulator {
    fn open(sequence_index: usize, header: String, partitioner: &Partitioner) -> Self {
        Self {
            sequence_index,
            header_len: header.len(),
            bytes: partitioner.envelope_len(&header),
            text: header,
            fragment_count: 0,
        }
    }

    fn push(&mut self, fragment: &str, fragment_bytes: usize) {
        self.text.push_str(fragment);
        self.bytes += fragment_bytes;
        self.fragment_count += 1;
    }

    fn close(self, max_bytes: usize) -> MessagePart {
        if self.bytes > max_bytes {
            tracing::warn!(
                part = self.sequence_index,
                envelope_bytes = self.bytes,
                max_bytes = max_bytes,
                "Single alert exceeds the message size limit, sending it whole"
            );
            metrics::counter!("g2ww_parts_oversized_total").increment(1);
        }

        MessagePart {
            sequence_index: self.sequence_index,
            header: self.text[..self.header_len].to_string(),
            text: self.text,
            fragment_count: self.fragment_count,
            envelope_bytes: self.bytes,
        }
    }
}
