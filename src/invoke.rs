//! src/invoke.rs
//! Runs the external build tool against a prepared directory.
//!
//! The tool is started as `<tool> <target>` with `working_dir` as its current
//! directory. Stdout and stderr are drained on their own threads so output
//! written before a timeout is kept. The call blocks until the process exits
//! or the optional timeout expires.

use std::env;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{Dir2RpmError, Result};

const SPAWN_ATTEMPTS: u32 = 3;
const POLL_INTERVAL: Duration = Duration::from_millis(20);
// How long to wait for the pipes to close after a killed tool.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// What the tool printed and how it exited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
    /// `None` when the process was terminated by a signal or killed on timeout.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Set when the tool was killed for running longer than this.
    pub timed_out_after: Option<Duration>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && self.timed_out_after.is_none()
    }

    /// The `ToolExecutionFailed` error for a non-zero exit or a timeout, if any.
    pub fn failure(&self) -> Option<Dir2RpmError> {
        if self.success() {
            return None;
        }
        let reason = match (self.timed_out_after, self.exit_code) {
            (Some(limit), _) => format!("timed out after {:.1}s and was killed", limit.as_secs_f64()),
            (None, Some(code)) => format!("build tool exited with status {}", code),
            (None, None) => "build tool was terminated by a signal".to_string(),
        };
        Some(Dir2RpmError::ToolExecutionFailed {
            exit_code: self.exit_code,
            stderr: self.stderr.clone(),
            reason,
        })
    }
}

/// Resolves `tool` to an existing executable file, as an absolute path.
/// A bare name that is not in the current directory is looked up on `PATH`.
pub fn locate_tool(tool: &Path) -> Result<PathBuf> {
    let is_bare = tool.components().count() == 1 && !tool.is_absolute();
    if is_bare && !tool.exists() {
        if let Some(found) = search_path(tool) {
            debug!(tool = %tool.display(), found = %found.display(), "resolved build tool on PATH");
            return Ok(found);
        }
        return Err(Dir2RpmError::ToolNotFound { path: tool.to_path_buf() });
    }
    if !is_invocable(tool) {
        return Err(Dir2RpmError::ToolNotFound { path: tool.to_path_buf() });
    }
    absolute(tool).map_err(|e| Dir2RpmError::io(format!("could not resolve '{}'", tool.display()), e))
}

/// `path` joined onto the current directory unless it is already absolute.
pub fn absolute(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

/// Runs the tool to completion. A non-zero exit or a timeout is still `Ok`;
/// inspect [`ToolOutput::failure`]. Errors are returned for a missing tool or
/// a spawn failure.
#[instrument(skip_all, fields(tool = %tool.display(), target = %target.display()))]
pub fn invoke(tool: &Path, target: &Path, working_dir: &Path, timeout: Option<Duration>) -> Result<ToolOutput> {
    let tool = locate_tool(tool)?;
    if !working_dir.is_dir() {
        return Err(Dir2RpmError::invalid_input(format!(
            "working directory '{}' does not exist",
            working_dir.display()
        )));
    }
    // The child runs elsewhere, so a relative target would resolve against the wrong directory.
    let target = absolute(target).map_err(|e| Dir2RpmError::io(format!("could not resolve '{}'", target.display()), e))?;

    let mut child = spawn(&tool, &target, working_dir)?;
    info!(pid = child.id(), "build tool started");

    let stdout = child.stdout.take().map(Capture::start);
    let stderr = child.stderr.take().map(Capture::start);

    let waited = wait_for(&mut child, timeout);
    let grace = match waited {
        Ok(Some(_)) => None,
        _ => Some(DRAIN_GRACE),
    };
    let stdout = stdout.map(|c| c.finish(grace)).unwrap_or_default();
    let stderr = stderr.map(|c| c.finish(grace)).unwrap_or_default();

    let status = waited.map_err(|e| Dir2RpmError::ToolExecutionFailed {
        exit_code: None,
        stderr: stderr.clone(),
        reason: format!("failed while waiting for build tool: {}", e),
    })?;

    let result = match status {
        Some(status) => ToolOutput { exit_code: status.code(), stdout, stderr, timed_out_after: None },
        None => {
            warn!(timeout_secs = timeout.map(|t| t.as_secs_f64()), "build tool timed out");
            ToolOutput { exit_code: None, stdout, stderr, timed_out_after: timeout }
        }
    };
    info!(
        exit_code = ?result.exit_code,
        stdout_bytes = result.stdout.len(),
        stderr_bytes = result.stderr.len(),
        "build tool finished"
    );
    Ok(result)
}

/// `Ok(None)` means the deadline passed and the child was killed.
fn wait_for(child: &mut Child, timeout: Option<Duration>) -> io::Result<Option<ExitStatus>> {
    let Some(limit) = timeout else {
        return child.wait().map(Some);
    };
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            if let Err(e) = child.kill() {
                debug!(error = %e, "kill after timeout failed");
            }
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// One output pipe, read to the end on a background thread.
struct Capture {
    buf: Arc<Mutex<Vec<u8>>>,
    done: mpsc::Receiver<()>,
}

impl Capture {
    fn start<R: Read + Send + 'static>(mut reader: R) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let (tx, done) = mpsc::channel();
        thread::spawn(move || {
            let mut chunk = [0u8; 8192];
            loop {
                match reader.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => {
                        if let Ok(mut b) = sink.lock() {
                            b.extend_from_slice(&chunk[..n]);
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
            let _ = tx.send(());
        });
        Capture { buf, done }
    }

    /// Waits for end of stream (at most `grace`, if given) and returns what was read so far.
    fn finish(self, grace: Option<Duration>) -> String {
        let _ = match grace {
            Some(g) => self.done.recv_timeout(g).map_err(|_| ()),
            None => self.done.recv().map_err(|_| ()),
        };
        let bytes = self.buf.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

fn spawn(tool: &Path, target: &Path, working_dir: &Path) -> Result<Child> {
    let mut attempt = 1;
    loop {
        let spawned = Command::new(tool)
            .arg(target)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        match spawned {
            Ok(child) => return Ok(child),
            Err(e) if is_text_busy(&e) && attempt < SPAWN_ATTEMPTS => {
                debug!(attempt, "build tool busy, retrying spawn");
                attempt += 1;
                thread::sleep(Duration::from_millis(50 * u64::from(attempt)));
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied) => {
                return Err(Dir2RpmError::ToolNotFound { path: tool.to_path_buf() });
            }
            Err(e) => {
                return Err(Dir2RpmError::ToolExecutionFailed {
                    exit_code: None,
                    stderr: String::new(),
                    reason: format!("could not start build tool: {}", e),
                });
            }
        }
    }
}

fn search_path(name: &Path) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths).map(|dir| dir.join(name)).find(|p| is_invocable(p))
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        fn is_invocable(path: &Path) -> bool {
            use nix::unistd::{access, AccessFlags};
            path.is_file() && access(path, AccessFlags::X_OK).is_ok()
        }

        // The executable may still be open for writing in a freshly forked process.
        fn is_text_busy(e: &io::Error) -> bool {
            e.raw_os_error() == Some(nix::errno::Errno::ETXTBSY as i32)
        }
    } else {
        fn is_invocable(path: &Path) -> bool {
            path.is_file()
        }

        fn is_text_busy(_e: &io::Error) -> bool {
            false
        }
    }
}
