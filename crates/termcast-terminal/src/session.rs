use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};

use crate::error::TerminalError;
use crate::{DEFAULT_COLS, DEFAULT_ROWS};

/// Grace interval between the interrupt write and termination.
const INTERRUPT_GRACE: Duration = Duration::from_millis(150);

/// What to spawn and how big the terminal starts out.
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub cols: u16,
    pub rows: u16,
}

impl SpawnSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            cwd: None,
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
        }
    }
}

/// One spawned process inside a pseudo-terminal.
///
/// The pid and child handle exist exactly while the process is running;
/// `stop` always clears them, whether or not termination succeeded.
pub struct PtySession {
    spec: SpawnSpec,
    cols: u16,
    rows: u16,
    master: Option<Box<dyn MasterPty + Send>>,
    writer: Option<Box<dyn Write + Send>>,
    child: Option<Box<dyn Child + Send + Sync>>,
    pid: Option<u32>,
}

/// Cloned read half of the PTY, owned by the output reader thread so
/// blocking reads never happen under a lock.
pub struct SessionOutput {
    inner: Box<dyn Read + Send>,
}

impl SessionOutput {
    /// Blocking read of up to `max_bytes` of decoded text.
    ///
    /// Returns an empty string on a would-block condition and
    /// `EndOfStream` once the process output is closed for good.
    pub fn read(&mut self, max_bytes: usize) -> Result<String, TerminalError> {
        let mut buffer = vec![0u8; max_bytes];
        match self.inner.read(&mut buffer) {
            Ok(0) => Err(TerminalError::EndOfStream),
            Ok(n) => Ok(String::from_utf8_lossy(&buffer[..n]).into_owned()),
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                Ok(String::new())
            }
            Err(e) => Err(TerminalError::Io(e)),
        }
    }
}

impl PtySession {
    pub fn new(spec: SpawnSpec) -> Self {
        let (cols, rows) = (spec.cols, spec.rows);
        Self {
            spec,
            cols,
            rows,
            master: None,
            writer: None,
            child: None,
            pid: None,
        }
    }

    /// Spawn the configured command inside a fresh PTY.
    ///
    /// On failure the session stays in its not-started state: no child, no
    /// pid, nothing to clean up.
    pub fn start(&mut self) -> Result<(), TerminalError> {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(PtySize {
                rows: self.rows,
                cols: self.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| TerminalError::Spawn(format!("failed to open pty: {e}")))?;

        let master = pair.master;
        let slave = pair.slave;

        let mut cmd = CommandBuilder::new(&self.spec.command);
        cmd.args(&self.spec.args);
        if let Some(cwd) = &self.spec.cwd {
            cmd.cwd(cwd);
        }

        let child = slave
            .spawn_command(cmd)
            .map_err(|e| TerminalError::Spawn(format!("failed to spawn command: {e}")))?;

        // The parent must not keep the slave end open, or the cloned
        // reader never sees EOF after the child exits.
        drop(slave);

        let writer = master
            .take_writer()
            .map_err(|e| TerminalError::Spawn(format!("failed to take pty writer: {e}")))?;

        self.pid = child.process_id();
        self.child = Some(child);
        self.writer = Some(writer);
        self.master = Some(master);
        Ok(())
    }

    /// True iff a child exists and the OS still reports it running.
    pub fn is_alive(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn dimensions(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    /// Clone the PTY read half for the output reader thread.
    pub fn output(&self) -> Result<SessionOutput, TerminalError> {
        let master = self
            .master
            .as_ref()
            .ok_or_else(|| TerminalError::Spawn("session not started".to_string()))?;
        let inner = master
            .try_clone_reader()
            .map_err(|e| TerminalError::Spawn(format!("failed to clone pty reader: {e}")))?;
        Ok(SessionOutput { inner })
    }

    /// Send raw text to the process input. No-op when not alive.
    pub fn write(&mut self, data: &str) -> Result<(), TerminalError> {
        if !self.is_alive() {
            return Ok(());
        }
        if let Some(writer) = self.writer.as_mut() {
            writer.write_all(data.as_bytes())?;
            writer.flush()?;
        }
        Ok(())
    }

    /// Record new dimensions, informing the OS only while alive.
    ///
    /// Positivity is gated by callers; the stored size is whatever was
    /// requested.
    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<(), TerminalError> {
        self.cols = cols;
        self.rows = rows;
        if !self.is_alive() {
            return Ok(());
        }
        if let Some(master) = self.master.as_ref() {
            master
                .resize(PtySize {
                    rows,
                    cols,
                    pixel_width: 0,
                    pixel_height: 0,
                })
                .map_err(|e| TerminalError::Io(std::io::Error::other(e.to_string())))?;
        }
        Ok(())
    }

    /// Graceful-then-forceful teardown.
    ///
    /// Interrupt, short grace interval, kill, and with `force` an OS-level
    /// SIGKILL by pid as the last resort. Every step before the forced
    /// kill is best-effort; state is cleared no matter what, so the
    /// session never reports alive after this returns.
    pub fn stop(&mut self, force: bool) -> Result<(), TerminalError> {
        if self.child.is_none() {
            return Ok(());
        }

        if self.is_alive() {
            if let Some(writer) = self.writer.as_mut() {
                let _ = writer.write_all(b"\x03");
                let _ = writer.flush();
            }
            std::thread::sleep(INTERRUPT_GRACE);
        }

        if self.is_alive() {
            if let Some(child) = self.child.as_mut() {
                let _ = child.kill();
            }
        }

        let mut result = Ok(());
        if force && self.is_alive() {
            if let Some(pid) = self.pid {
                result = force_kill(pid);
            }
        }

        self.child = None;
        self.pid = None;
        self.writer = None;
        // Dropping the master closes our side of the PTY, which unblocks
        // the reader thread with EOF.
        self.master = None;
        result
    }
}

#[cfg(unix)]
fn force_kill(pid: u32) -> Result<(), TerminalError> {
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        return Err(TerminalError::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(windows)]
fn force_kill(pid: u32) -> Result<(), TerminalError> {
    std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .output()
        .map(|_| ())
        .map_err(TerminalError::Io)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell_spec(args: &[&str]) -> SpawnSpec {
        let mut spec = SpawnSpec::new("sh");
        spec.args = args.iter().map(|s| s.to_string()).collect();
        spec
    }

    #[test]
    fn spawn_failure_leaves_session_not_started() {
        let mut session = PtySession::new(SpawnSpec::new("/nonexistent-termcast-test-binary"));
        let err = session.start().unwrap_err();
        assert!(matches!(err, TerminalError::Spawn(_)));
        assert!(!session.is_alive());
        assert_eq!(session.pid(), None);
    }

    #[test]
    fn start_then_stop_clears_state() {
        let mut session = PtySession::new(shell_spec(&["-c", "sleep 5"]));
        session.start().unwrap();
        assert!(session.is_alive());
        assert!(session.pid().is_some());

        session.stop(true).unwrap();
        assert!(!session.is_alive());
        assert_eq!(session.pid(), None);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut session = PtySession::new(shell_spec(&["-c", "sleep 5"]));
        session.start().unwrap();
        session.stop(false).unwrap();
        session.stop(true).unwrap();
        assert!(!session.is_alive());
    }

    #[test]
    fn force_stop_terminates_child_when_reader_was_never_taken() {
        let mut session = PtySession::new(shell_spec(&["-c", "sleep 5"]));
        session.start().unwrap();
        assert!(session.is_alive());

        session.stop(true).unwrap();
        assert!(!session.is_alive());
        assert_eq!(session.pid(), None);
    }

    #[test]
    fn resize_while_dead_stores_dimensions() {
        let mut session = PtySession::new(shell_spec(&["-c", "true"]));
        session.resize(132, 50).unwrap();
        assert_eq!(session.dimensions(), (132, 50));
    }

    #[test]
    fn output_reads_child_output_until_eof() {
        let mut session = PtySession::new(shell_spec(&["-c", "printf hello"]));
        session.start().unwrap();
        let mut output = session.output().unwrap();

        let mut seen = String::new();
        loop {
            match output.read(4096) {
                Ok(chunk) => seen.push_str(&chunk),
                Err(TerminalError::EndOfStream) => break,
                Err(_) => break,
            }
        }
        assert!(seen.contains("hello"), "got: {seen:?}");
        session.stop(true).unwrap();
    }
}
