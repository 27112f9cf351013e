use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;

/// Bounded FIFO bridging the blocking reader thread into the async
/// broadcaster.
///
/// The producer side is a plain OS thread and never blocks: pushing onto a
/// full queue evicts the single oldest chunk to make room. The consumer is
/// one tokio task polling with a timeout so it stays responsive to a stop
/// signal.
pub struct OutputQueue {
    inner: Mutex<VecDeque<String>>,
    notify: Notify,
    capacity: usize,
}

impl OutputQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    /// Enqueue a chunk, dropping the oldest queued chunk if full.
    pub fn push(&self, chunk: String) {
        {
            let mut queue = self.inner.lock().unwrap();
            if queue.len() == self.capacity {
                queue.pop_front();
            }
            queue.push_back(chunk);
        }
        self.notify.notify_one();
    }

    fn try_pop(&self) -> Option<String> {
        self.inner.lock().unwrap().pop_front()
    }

    /// Wait up to `wait` for the next chunk; `None` on timeout.
    pub async fn recv(&self, wait: Duration) -> Option<String> {
        // Register for a wakeup before checking, so a push racing with the
        // empty check still completes the notified future.
        let notified = self.notify.notified();
        if let Some(chunk) = self.try_pop() {
            return Some(chunk);
        }
        match tokio::time::timeout(wait, notified).await {
            Ok(()) => self.try_pop(),
            Err(_) => None,
        }
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}
