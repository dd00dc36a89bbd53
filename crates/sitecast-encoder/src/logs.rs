//! Bounded buffer for encoder diagnostic output.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

/// Bytes of encoder output kept in memory.
pub const LOG_BUFFER_CAPACITY: usize = 64 * 1024;

/// Shared ring buffer of raw encoder output.
///
/// Oldest bytes are dropped once the capacity is reached. Clones share the
/// same storage.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    inner: Arc<Mutex<VecDeque<u8>>>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(8192)))),
            capacity,
        }
    }

    /// Append a chunk, evicting the oldest bytes if full.
    pub fn push(&self, chunk: &[u8]) {
        let chunk = if chunk.len() > self.capacity {
            &chunk[chunk.len() - self.capacity..]
        } else {
            chunk
        };

        let mut buf = self.inner.lock();
        let overflow = (buf.len() + chunk.len()).saturating_sub(self.capacity);
        buf.drain(..overflow);
        buf.extend(chunk);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// The last `max_bytes` of output as text.
    ///
    /// The cut never lands inside a UTF-8 sequence. Invalid bytes are
    /// replaced.
    pub fn tail(&self, max_bytes: usize) -> String {
        let bytes: Vec<u8> = {
            let buf = self.inner.lock();
            let start = buf.len().saturating_sub(max_bytes);
            buf.range(start..).copied().collect()
        };

        // Skip continuation bytes left over from a split character
        let skip = bytes
            .iter()
            .take(3)
            .take_while(|b| (**b & 0b1100_0000) == 0b1000_0000)
            .count();

        String::from_utf8_lossy(&bytes[skip..]).into_owned()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(LOG_BUFFER_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest() {
        let logs = LogBuffer::new(8);
        logs.push(b"hello ");
        logs.push(b"world");
        assert_eq!(logs.len(), 8);
        assert_eq!(logs.tail(100), "lo world");
    }

    #[test]
    fn test_oversized_chunk_keeps_end() {
        let logs = LogBuffer::new(4);
        logs.push(b"abcdefgh");
        assert_eq!(logs.tail(4), "efgh");
    }

    #[test]
    fn test_tail_does_not_split_characters() {
        let logs = LogBuffer::default();
        logs.push("frame=1 é".as_bytes());
        // Last three bytes are a space plus both bytes of 'é'; two bytes
        // would start mid-character.
        assert_eq!(logs.tail(3), " é");
        assert_eq!(logs.tail(1), "");
        assert!(!logs.tail(2).contains('\u{FFFD}'));
    }

    #[test]
    fn test_clones_share_storage() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        writer.push(b"speed=1.0x");
        assert_eq!(logs.tail(4096), "speed=1.0x");
    }
}
