use std::collections::VecDeque;

/// Bounded scrollback of sanitized output chunks, oldest first.
///
/// Both caps are enforced after every push by evicting from the front, so
/// the retained contents are always the most recent suffix of what was
/// appended. Shared between the session manager and the output reader as
/// `Arc<Mutex<HistoryBuffer>>`.
pub struct HistoryBuffer {
    chunks: VecDeque<String>,
    total_bytes: usize,
    max_bytes: usize,
    max_chunks: usize,
}

impl HistoryBuffer {
    pub fn new(max_bytes: usize, max_chunks: usize) -> Self {
        Self {
            chunks: VecDeque::new(),
            total_bytes: 0,
            max_bytes,
            max_chunks,
        }
    }

    /// Append a chunk, then evict oldest entries until both caps hold.
    pub fn push(&mut self, chunk: String) {
        self.total_bytes += chunk.len();
        self.chunks.push_back(chunk);

        while !self.chunks.is_empty()
            && (self.total_bytes > self.max_bytes || self.chunks.len() > self.max_chunks)
        {
            if let Some(evicted) = self.chunks.pop_front() {
                self.total_bytes -= evicted.len();
            }
        }
    }

    /// Copy of the current contents, oldest first. Safe to iterate without
    /// holding any lock afterward.
    pub fn snapshot(&self) -> Vec<String> {
        self.chunks.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.total_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }
}
