//! External tool supervision.
//!
//! Every tool invocation runs as a child with piped output. Two reader
//! threads drain stdout and stderr into the log line by line, and the child
//! is waited on in short slices so an interrupt handler can reach the
//! registry at any time:
//!
//! ```text
//!   run() ──spawn──> registry[id] = child ──wait slice──┐
//!                                           ^           │ still running
//!                                           └───────────┘
//!   terminate_all() ── refuse new runs, kill + reap every registry entry
//! ```
//!
//! On unix each child leads its own process group, and kills go to the
//! whole group: pip starts build backends that inherit the output pipes,
//! and they must die with it. On timeout the tree is killed, the child
//! reaped and unregistered before the call returns [`ToolError::Timeout`].

use crate::error::ToolError;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

/// Length of one wait slice.
const WAIT_SLICE: Duration = Duration::from_millis(100);

/// How long output readers may lag behind the child's exit.
const READER_GRACE: Duration = Duration::from_secs(2);

/// Log target for tool output lines.
const TOOL_TARGET: &str = "wheelhouse::tool";

type SharedChild = Arc<Mutex<Child>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Tracks in-flight tool children so they can be swept on interrupt.
#[derive(Debug, Default)]
pub struct ProcessSupervisor {
    children: Mutex<HashMap<u64, SharedChild>>,
    next_id: AtomicU64,
    shutting_down: AtomicBool,
}

impl ProcessSupervisor {
    /// Empty supervisor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of children currently tracked.
    pub fn active(&self) -> usize {
        lock(&self.children).len()
    }

    /// True once [`terminate_all`](Self::terminate_all) has run.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// `None` when shutdown started; the caller owns the child then.
    fn register(&self, child: SharedChild) -> Option<u64> {
        let mut children = lock(&self.children);
        if self.is_shutting_down() {
            return None;
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        children.insert(id, child);
        Some(id)
    }

    fn unregister(&self, id: u64) {
        lock(&self.children).remove(&id);
    }

    /// Stop accepting runs, then kill and reap every tracked child with its
    /// process group. Returns how many were terminated.
    pub fn terminate_all(&self) -> usize {
        let children: Vec<(u64, SharedChild)> = {
            let mut registry = lock(&self.children);
            self.shutting_down.store(true, Ordering::SeqCst);
            registry.drain().collect()
        };
        for (id, child) in &children {
            let mut child = lock(child);
            debug!("terminating tool child #{} (pid {})", id, child.id());
            if let Err(e) = kill_tree(&mut child) {
                debug!("kill #{}: {}", id, e);
            }
            if let Err(e) = child.wait() {
                debug!("reap #{}: {}", id, e);
            }
        }
        children.len()
    }

    /// Run `program args...` to completion, bounded by `timeout`.
    ///
    /// A non-zero exit is [`ToolError::CommandFailed`]. Once shutdown has
    /// started, runs are refused or cut short with [`ToolError::Interrupted`].
    pub fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<(), ToolError> {
        let command = command_line(program, args);
        if self.is_shutting_down() {
            return Err(ToolError::Interrupted { command });
        }
        debug!("Running: {}", command);

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        let mut child = cmd.spawn().map_err(|source| ToolError::Spawn {
            program: program.to_string(),
            source,
        })?;
        let pid = child.id();

        let mut readers = Vec::with_capacity(2);
        if let Some(out) = child.stdout.take() {
            readers.push(spawn_reader(out, false));
        }
        if let Some(err) = child.stderr.take() {
            readers.push(spawn_reader(err, true));
        }

        let child = Arc::new(Mutex::new(child));
        let Some(id) = self.register(Arc::clone(&child)) else {
            let mut child = lock(&child);
            kill_tree(&mut child)?;
            child.wait()?;
            drop(child);
            finish_readers(pid, readers);
            return Err(ToolError::Interrupted { command });
        };
        let waited = wait_bounded(&child, timeout);
        self.unregister(id);
        finish_readers(pid, readers);

        match waited? {
            Some(status) if status.success() => Ok(()),
            Some(_) if self.is_shutting_down() => Err(ToolError::Interrupted { command }),
            Some(status) => Err(ToolError::CommandFailed {
                command,
                code: status.code(),
            }),
            None => Err(ToolError::Timeout { command, timeout }),
        }
    }
}

/// Wait for the child in slices. `Ok(None)` when the deadline passed; the
/// child's tree has then been killed and the child reaped.
fn wait_bounded(child: &SharedChild, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let started = Instant::now();
    loop {
        let mut guard = lock(child);
        if let Some(status) = guard.wait_timeout(WAIT_SLICE)? {
            return Ok(Some(status));
        }
        if started.elapsed() >= timeout {
            warn!("tool exceeded {:?}, killing pid {}", timeout, guard.id());
            kill_tree(&mut guard)?;
            guard.wait()?;
            return Ok(None);
        }
    }
}

/// Kill the child's process group, falling back to the child alone.
fn kill_tree(child: &mut Child) -> std::io::Result<()> {
    if kill_group(child.id()) {
        return Ok(());
    }
    child.kill()
}

#[cfg(unix)]
fn kill_group(pgid: u32) -> bool {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return false;
    };
    // SAFETY: killpg only sends a signal. The group was created for this
    // child with `process_group(0)`, so its id equals the child's pid.
    unsafe { libc::killpg(pgid, libc::SIGKILL) == 0 }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) -> bool {
    false
}

/// Join the output readers. Descendants still holding the pipes after the
/// child is gone get their group killed; readers that outlive that are
/// detached.
fn finish_readers(pid: u32, readers: Vec<JoinHandle<()>>) {
    let mut pending = join_within(readers, READER_GRACE);
    if pending.is_empty() {
        return;
    }
    debug!("tool output still open after pid {} exited, killing its group", pid);
    kill_group(pid);
    pending = join_within(pending, READER_GRACE);
    if !pending.is_empty() {
        warn!("detaching {} tool output readers of pid {}", pending.len(), pid);
    }
}

/// Join every reader that finishes within `bound`; return the rest.
fn join_within(mut readers: Vec<JoinHandle<()>>, bound: Duration) -> Vec<JoinHandle<()>> {
    let deadline = Instant::now() + bound;
    loop {
        let (done, running): (Vec<_>, Vec<_>) = readers.into_iter().partition(|r| r.is_finished());
        for reader in done {
            if reader.join().is_err() {
                warn!("tool output reader panicked");
            }
        }
        readers = running;
        if readers.is_empty() || Instant::now() >= deadline {
            return readers;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

fn spawn_reader<R: Read + Send + 'static>(stream: R, is_stderr: bool) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for line in BufReader::new(stream).lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            if is_stderr {
                warn!(target: TOOL_TARGET, "{}", line);
            } else {
                info!(target: TOOL_TARGET, "{}", line);
            }
        }
    })
}

/// Command line as a single shell-quoted string, for logs and errors.
pub fn command_line(program: &str, args: &[String]) -> String {
    let mut words = Vec::with_capacity(args.len() + 1);
    words.push(program);
    words.extend(args.iter().map(String::as_str));
    shell_words::join(words)
}
