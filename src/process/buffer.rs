//! Append-only output buffer shared between a drain producer and a
//! matcher consumer
//!
//! Bytes are never truncated during the handle's life; a consumed cursor
//! marks how far matching has progressed. The cursor is monotonically
//! non-decreasing. Exactly one drain task appends and one matcher reads
//! at a time; the mutex keeps the two from interleaving, and the notifier
//! wakes a matcher blocked on bytes that have not arrived yet.

use std::sync::Mutex;

use tokio::sync::futures::Notified;
use tokio::sync::Notify;

use crate::expect::{MatchOutput, Pattern};

/// Shared output state for one process handle
#[derive(Debug, Default)]
pub struct OutputBuffer {
    state: Mutex<BufferState>,
    notify: Notify,
}

#[derive(Debug, Default)]
struct BufferState {
    data: Vec<u8>,
    cursor: usize,
    eof: bool,
}

/// An atomic snapshot of one matching attempt
pub struct Scan {
    /// The match, if the pattern was found in unconsumed bytes
    pub matched: Option<MatchOutput>,
    /// Whether the producing stream has ended
    pub eof: bool,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append newly produced bytes and wake any waiting matcher
    pub fn append(&self, bytes: &[u8]) {
        {
            let mut state = self.state.lock().expect("output buffer poisoned");
            state.data.extend_from_slice(bytes);
        }
        self.notify.notify_waiters();
    }

    /// Record that the producing stream has ended
    pub fn mark_eof(&self) {
        {
            let mut state = self.state.lock().expect("output buffer poisoned");
            state.eof = true;
        }
        self.notify.notify_waiters();
    }

    /// Try to match `pattern` against the unconsumed region
    ///
    /// On a match the cursor advances to the end of the match, so already
    /// consumed bytes are never re-matched. On a miss the cursor is left
    /// untouched. The eof flag is read under the same lock, so a sentinel
    /// emitted just before exit is never misreported as an early exit.
    pub fn scan(&self, pattern: &Pattern) -> Scan {
        let mut state = self.state.lock().expect("output buffer poisoned");
        let cursor = state.cursor;
        match pattern.find(&state.data[cursor..]) {
            Some(found) => {
                state.cursor = cursor + found.end;
                Scan {
                    matched: Some(found.output),
                    eof: state.eof,
                }
            }
            None => Scan {
                matched: None,
                eof: state.eof,
            },
        }
    }

    /// A future resolving on the next append or eof
    ///
    /// Create this *before* scanning so a producer racing with the scan
    /// cannot slip a wakeup between the two.
    pub fn changed(&self) -> Notified<'_> {
        self.notify.notified()
    }

    /// Whether the producing stream has ended
    pub fn is_eof(&self) -> bool {
        self.state.lock().expect("output buffer poisoned").eof
    }

    /// Current consumed cursor position
    pub fn cursor(&self) -> usize {
        self.state.lock().expect("output buffer poisoned").cursor
    }

    /// Total bytes buffered so far
    pub fn len(&self) -> usize {
        self.state.lock().expect("output buffer poisoned").data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The unconsumed tail as a lossy string, truncated to `max` bytes,
    /// for failure diagnostics
    pub fn unconsumed_lossy(&self, max: usize) -> String {
        let state = self.state.lock().expect("output buffer poisoned");
        let tail = &state.data[state.cursor..];
        let shown = &tail[tail.len().saturating_sub(max)..];
        let mut text = String::from_utf8_lossy(shown).into_owned();
        if shown.len() < tail.len() {
            text.insert_str(0, "...");
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_advances_cursor() {
        let buffer = OutputBuffer::new();
        buffer.append(b"hello world\n");

        let p = Pattern::literal(b"hello".as_slice());
        let scan = buffer.scan(&p);
        assert_eq!(scan.matched.unwrap().bytes, b"hello");
        assert_eq!(buffer.cursor(), 5);

        // Consumed bytes are never re-matched
        let scan = buffer.scan(&p);
        assert!(scan.matched.is_none());
        assert_eq!(buffer.cursor(), 5);
    }

    #[test]
    fn test_miss_leaves_cursor_untouched() {
        let buffer = OutputBuffer::new();
        buffer.append(b"partial out");

        let p = Pattern::literal(b"missing".as_slice());
        assert!(buffer.scan(&p).matched.is_none());
        assert_eq!(buffer.cursor(), 0);

        // The buffered bytes are preserved for a retry
        let p = Pattern::literal(b"partial".as_slice());
        assert!(buffer.scan(&p).matched.is_some());
    }

    #[test]
    fn test_sequential_matches_are_forward_only() {
        let buffer = OutputBuffer::new();
        buffer.append(b"ok\nok\n");

        let p = Pattern::literal(b"ok".as_slice());
        assert!(buffer.scan(&p).matched.is_some());
        assert_eq!(buffer.cursor(), 2);
        assert!(buffer.scan(&p).matched.is_some());
        assert_eq!(buffer.cursor(), 5);
        assert!(buffer.scan(&p).matched.is_none());
    }

    #[test]
    fn test_eof_is_reported_with_the_scan() {
        let buffer = OutputBuffer::new();
        buffer.append(b"test succeeded\n");
        buffer.mark_eof();

        // A sentinel buffered before eof still matches
        let p = Pattern::literal(b"test succeeded".as_slice());
        let scan = buffer.scan(&p);
        assert!(scan.matched.is_some());
        assert!(scan.eof);
    }

    #[test]
    fn test_unconsumed_lossy_truncates_from_the_front() {
        let buffer = OutputBuffer::new();
        buffer.append(b"0123456789");
        let tail = buffer.unconsumed_lossy(4);
        assert_eq!(tail, "...6789");
    }
}
