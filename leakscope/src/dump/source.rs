//! Dump sources
//!
//! The detector never talks to a runtime directly. It asks a [`DumpSource`]
//! for bytes, once per attempt, and parses whatever comes back.

use std::io;
use std::path::PathBuf;
use std::process::Command;

use leakscope_common::DEFAULT_DUMP_BUFFER_SIZE;
use log::debug;

/// Producer of goroutine dump text.
pub trait DumpSource {
    /// Dump of every live goroutine.
    ///
    /// # Errors
    /// Any failure to obtain the bytes. The detector aborts the attempt and
    /// does not retry.
    fn all_tasks(&mut self) -> io::Result<Vec<u8>>;

    /// Dump of the calling goroutine only, used to exclude the caller from
    /// its own results. `None` when the caller is not one of the inspected
    /// goroutines (e.g. the dump comes from another process).
    ///
    /// # Errors
    /// Any failure to obtain the bytes.
    fn current_task(&mut self) -> io::Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

impl<S: DumpSource + ?Sized> DumpSource for &mut S {
    fn all_tasks(&mut self) -> io::Result<Vec<u8>> {
        (**self).all_tasks()
    }

    fn current_task(&mut self) -> io::Result<Option<Vec<u8>>> {
        (**self).current_task()
    }
}

/// Run a runtime-style capture function until the dump fits.
///
/// `capture` fills the buffer and returns how many bytes it wrote, the way
/// Go's `runtime.Stack(buf, all)` does. A full buffer means the dump may have
/// been truncated, so the buffer starts at 64 KiB and doubles until the
/// returned length is strictly smaller than the buffer.
pub fn capture_with_growth<F>(mut capture: F) -> Vec<u8>
where
    F: FnMut(&mut [u8]) -> usize,
{
    let mut size = DEFAULT_DUMP_BUFFER_SIZE;
    loop {
        let mut buf = vec![0u8; size];
        let n = capture(&mut buf);
        if n < size {
            buf.truncate(n);
            return buf;
        }
        debug!("dump filled {size} byte buffer, retrying with {}", size * 2);
        size *= 2;
    }
}

/// A fixed dump, returned unchanged on every attempt.
///
/// Used for stdin and for replaying captured dumps.
#[derive(Debug, Clone, Default)]
pub struct StaticDump {
    all: Vec<u8>,
    current: Option<Vec<u8>>,
}

impl StaticDump {
    pub fn new(all: impl Into<Vec<u8>>) -> Self {
        Self { all: all.into(), current: None }
    }

    /// Also report `current` as the caller's own stack.
    #[must_use]
    pub fn with_current(mut self, current: impl Into<Vec<u8>>) -> Self {
        self.current = Some(current.into());
        self
    }
}

impl DumpSource for StaticDump {
    fn all_tasks(&mut self) -> io::Result<Vec<u8>> {
        Ok(self.all.clone())
    }

    fn current_task(&mut self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.current.clone())
    }
}

/// A dump file, re-read on every attempt so an external writer can refresh it
/// between retries.
#[derive(Debug, Clone)]
pub struct FileDump {
    path: PathBuf,
}

impl FileDump {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DumpSource for FileDump {
    fn all_tasks(&mut self) -> io::Result<Vec<u8>> {
        debug!("reading dump from {}", self.path.display());
        std::fs::read(&self.path)
    }
}

/// A shell command whose stdout is the dump, run on every attempt.
///
/// ```text
/// curl -s http://localhost:6060/debug/pprof/goroutine?debug=2
/// ```
#[derive(Debug, Clone)]
pub struct CommandDump {
    command: String,
}

impl CommandDump {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into() }
    }
}

impl DumpSource for CommandDump {
    fn all_tasks(&mut self) -> io::Result<Vec<u8>> {
        debug!("running dump command: {}", self.command);
        let output = Command::new("sh").arg("-c").arg(&self.command).output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("dump command exited with {}: {}", output.status, stderr.trim()),
            ));
        }
        Ok(output.stdout)
    }
}

/// Adapter over a runtime capture function with `runtime.Stack` semantics:
/// `capture(buf, all)` writes either every goroutine (`all == true`) or only
/// the caller and returns the number of bytes written.
pub struct RuntimeDump<F> {
    capture: F,
}

impl<F> RuntimeDump<F>
where
    F: FnMut(&mut [u8], bool) -> usize,
{
    pub fn new(capture: F) -> Self {
        Self { capture }
    }
}

impl<F> DumpSource for RuntimeDump<F>
where
    F: FnMut(&mut [u8], bool) -> usize,
{
    fn all_tasks(&mut self) -> io::Result<Vec<u8>> {
        Ok(capture_with_growth(|buf| (self.capture)(buf, true)))
    }

    fn current_task(&mut self) -> io::Result<Option<Vec<u8>>> {
        Ok(Some(capture_with_growth(|buf| (self.capture)(buf, false))))
    }
}
