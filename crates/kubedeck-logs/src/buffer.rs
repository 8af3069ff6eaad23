//! Append-only text buffer for one log tail

use std::sync::Arc;

use parking_lot::RwLock;

/// Marker line placed at the top of every freshly opened tail
pub const TAIL_HEADER: &str = "----- log tail -----\n";

/// Shared append-only text buffer.
///
/// Written by the tail tasks, read by the rendering side through
/// whole-buffer snapshots. Content only grows for the lifetime of a tail;
/// a new tail gets a fresh buffer.
#[derive(Clone, Default)]
pub struct TailBuffer {
    inner: Arc<RwLock<String>>,
}

impl TailBuffer {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(String::new())),
        }
    }

    /// Seed the buffer with the header marker plus the initial fetch text
    pub fn set_initial(&self, text: &str) {
        let mut buf = self.inner.write();
        buf.clear();
        buf.push_str(TAIL_HEADER);
        buf.push_str(text);
    }

    /// Replace the contents with an explanatory message
    pub fn set_message(&self, message: &str) {
        let mut buf = self.inner.write();
        buf.clear();
        buf.push_str(message);
        if !message.ends_with('\n') {
            buf.push('\n');
        }
    }

    /// Append a chunk, separated from prior content on a line boundary
    pub fn append(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut buf = self.inner.write();
        if !buf.is_empty() && !buf.ends_with('\n') {
            buf.push('\n');
        }
        buf.push_str(text);
    }

    /// Current contents
    pub fn snapshot(&self) -> String {
        self.inner.read().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
