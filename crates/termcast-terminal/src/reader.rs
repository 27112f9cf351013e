use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::error::TerminalError;
use crate::history::HistoryBuffer;
use crate::queue::OutputQueue;
use crate::sanitize::strip_terminal_identity_responses;
use crate::session::{PtySession, SessionOutput};
use crate::READ_CHUNK_BYTES;

/// Background thread draining one session's output.
///
/// Every chunk read is sanitized, appended to history, and pushed onto the
/// distribution queue in that order, so both always observe the same
/// sequence. The loop ends on the stop flag, session death, end of stream
/// or any read error, and never panics outward.
pub struct OutputReader {
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl OutputReader {
    pub fn spawn(
        session: Arc<Mutex<PtySession>>,
        mut output: SessionOutput,
        history: Arc<Mutex<HistoryBuffer>>,
        queue: Arc<OutputQueue>,
    ) -> Self {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop_flag);

        let handle = thread::spawn(move || {
            loop {
                if flag.load(Ordering::Relaxed) {
                    break;
                }

                let alive = match session.lock() {
                    Ok(mut session) => session.is_alive(),
                    Err(_) => false,
                };
                if !alive {
                    break;
                }

                let chunk = match output.read(READ_CHUNK_BYTES) {
                    Ok(chunk) => chunk,
                    Err(TerminalError::EndOfStream) => break,
                    Err(e) => {
                        tracing::debug!("pty read failed, stopping reader: {e}");
                        break;
                    }
                };
                if chunk.is_empty() {
                    continue;
                }

                let chunk = strip_terminal_identity_responses(&chunk);
                if chunk.is_empty() {
                    continue;
                }

                if let Ok(mut history) = history.lock() {
                    history.push(chunk.clone());
                }
                queue.push(chunk);
            }
            tracing::debug!("output reader exited");
        });

        Self {
            stop_flag,
            handle: Some(handle),
        }
    }

    /// Ask the loop to exit at its next iteration. The loop may still sit
    /// in a blocking read until the PTY closes underneath it.
    pub fn request_stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    /// Wait for the thread to finish. Only call after the session has been
    /// stopped, so the blocking read is guaranteed to return.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::session::SpawnSpec;
    use std::time::{Duration, Instant};

    #[test]
    fn reader_moves_output_into_history_and_queue() {
        let mut spec = SpawnSpec::new("sh");
        spec.args = vec!["-c".to_string(), "printf 'hello from pty'; sleep 3".to_string()];
        let mut session = PtySession::new(spec);
        session.start().unwrap();
        let output = session.output().unwrap();

        let session = Arc::new(Mutex::new(session));
        let history = Arc::new(Mutex::new(HistoryBuffer::new(64 * 1024, 128)));
        let queue = Arc::new(OutputQueue::new(32));
        let reader = OutputReader::spawn(
            Arc::clone(&session),
            output,
            Arc::clone(&history),
            Arc::clone(&queue),
        );

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let text = history.lock().unwrap().snapshot().concat();
            if text.contains("hello from pty") {
                break;
            }
            assert!(Instant::now() < deadline, "no output before deadline");
            thread::sleep(Duration::from_millis(20));
        }
        assert!(!queue.is_empty());

        reader.request_stop();
        session.lock().unwrap().stop(true).unwrap();
        reader.join();
    }

    #[test]
    fn reader_exits_when_process_ends() {
        let mut spec = SpawnSpec::new("sh");
        spec.args = vec!["-c".to_string(), "true".to_string()];
        let mut session = PtySession::new(spec);
        session.start().unwrap();
        let output = session.output().unwrap();

        let session = Arc::new(Mutex::new(session));
        let history = Arc::new(Mutex::new(HistoryBuffer::new(1024, 16)));
        let queue = Arc::new(OutputQueue::new(8));
        let reader = OutputReader::spawn(Arc::clone(&session), output, history, queue);

        // No stop request: the loop must end on its own once the child is
        // gone and the stream closes.
        session.lock().unwrap().stop(true).unwrap();
        reader.join();
    }
}
