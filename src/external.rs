//! Running commands that are not builtins.
//!
//! Every stage of a pipeline becomes one forked child that replaces itself
//! with the target program. All descriptor wiring for a child is described up
//! front by a [`SpawnSpec`], built in the parent before `fork`, so the child
//! only performs `open`, `dup2`, `close`, `write` and `execvp` on memory
//! prepared before the fork, and never returns into shell logic.

use crate::command::{
    Command, ExitCode, Pipeline, Redirections, EXIT_NOT_FOUND, EXIT_OPEN_FAILED, EXIT_USAGE,
};
use anyhow::{Context, Result};
use log::{debug, warn};
use nix::fcntl::{open, OFlag};
use nix::libc;
use nix::sys::stat::Mode;
use nix::sys::wait::{wait, waitpid, WaitStatus};
use nix::unistd::{self, dup2, fork, pipe, ForkResult, Pid};
use std::ffi::{c_char, CString, NulError};
use std::io::Write;
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd, RawFd};

const NOT_FOUND_MESSAGE: &str = "Error: command not found!\n";
const SAME_FILE_MESSAGE: &str = "Error: input and output files cannot be equal!";

/// Where a child's standard input or output comes from.
enum Endpoint {
    /// Keep the descriptor inherited from the shell.
    Inherit,
    /// One end of a pipe owned by the parent.
    Pipe(RawFd),
    /// A redirection file, opened by the child itself.
    File {
        path: CString,
        /// Printed by the child if the file cannot be opened.
        error: String,
    },
}

impl Endpoint {
    fn file(path: &str) -> Result<Self, NulError> {
        Ok(Endpoint::File {
            path: CString::new(path)?,
            error: format!("Error: cannot open {path}!\n"),
        })
    }
}

/// Everything needed to start one child process.
pub(crate) struct SpawnSpec {
    argv: Vec<CString>,
    /// Null-terminated pointers into `argv`, handed to `execvp` as is.
    argv_ptrs: Vec<*const c_char>,
    stdin: Endpoint,
    stdout: Endpoint,
    /// Descriptors inherited across `fork` that belong to other stages.
    close: Vec<RawFd>,
}

impl SpawnSpec {
    fn new(command: &Command<'_>) -> Result<Self, NulError> {
        let argv = command
            .argv()
            .iter()
            .map(|arg| CString::new(*arg))
            .collect::<Result<Vec<_>, _>>()?;
        let argv_ptrs = argv
            .iter()
            .map(|arg| arg.as_ptr())
            .chain(std::iter::once(std::ptr::null()))
            .collect();
        Ok(Self {
            argv,
            argv_ptrs,
            stdin: Endpoint::Inherit,
            stdout: Endpoint::Inherit,
            close: Vec::new(),
        })
    }

    /// Forks a child running this spec and returns its pid.
    ///
    /// A failing `fork` is reported as an error; every other failure happens in
    /// the child and shows up in its exit status.
    fn launch(&self) -> Result<Pid> {
        // Anything still buffered would otherwise be written twice.
        std::io::stdout().flush().ok();

        // SAFETY: the child only calls async-signal-safe functions on data
        // prepared before the fork, then execs or exits.
        match syscall(|| unsafe { fork() }).context("Error in the fork")? {
            ForkResult::Parent { child } => {
                debug!("spawned {:?} as pid {}", self.argv[0], child);
                Ok(child)
            }
            ForkResult::Child => self.exec_child(),
        }
    }

    fn exec_child(&self) -> ! {
        wire(&self.stdin, libc::STDIN_FILENO, OFlag::O_RDONLY);
        wire(
            &self.stdout,
            libc::STDOUT_FILENO,
            OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
        );
        for &fd in &self.close {
            let _ = syscall(|| unistd::close(fd));
        }

        // SAFETY: `argv_ptrs` is null-terminated and points into `argv`,
        // which outlives the call.
        unsafe { libc::execvp(self.argv_ptrs[0], self.argv_ptrs.as_ptr()) };
        write_stdout(NOT_FOUND_MESSAGE.as_bytes());
        exit_child(EXIT_NOT_FOUND)
    }
}

/// Child side: make `endpoint` the descriptor `target`.
fn wire(endpoint: &Endpoint, target: RawFd, flags: OFlag) {
    let fd = match endpoint {
        Endpoint::Inherit => return,
        Endpoint::Pipe(fd) => *fd,
        Endpoint::File { path, error } => {
            match syscall(|| open(path.as_c_str(), flags, Mode::from_bits_truncate(0o644))) {
                Ok(fd) => fd,
                Err(_) => {
                    write_stdout(error.as_bytes());
                    exit_child(EXIT_OPEN_FAILED)
                }
            }
        }
    };
    if fd != target {
        if syscall(|| dup2(fd, target)).is_err() {
            exit_child(EXIT_OPEN_FAILED)
        }
        let _ = syscall(|| unistd::close(fd));
    }
}

/// Leaves the child without running exit handlers or flushing the buffers it
/// inherited from the shell.
fn exit_child(code: ExitCode) -> ! {
    // SAFETY: `_exit` is async-signal-safe and touches no Rust state.
    unsafe { libc::_exit(code) }
}

fn write_stdout(bytes: &[u8]) {
    // SAFETY: descriptor 1 stays open for the lifetime of the child.
    let stdout = unsafe { BorrowedFd::borrow_raw(libc::STDOUT_FILENO) };
    let _ = unistd::write(stdout, bytes);
}

/// Retries a system call interrupted by a signal.
fn syscall<F, T>(f: F) -> nix::Result<T>
where
    F: Fn() -> nix::Result<T>,
{
    loop {
        match f() {
            Err(nix::Error::EINTR) => (),
            result => return result,
        }
    }
}

/// Runs a pipeline with its redirections and blocks until every stage ended.
///
/// Returns the exit status to record, or `None` when no child terminated
/// normally (all of them were killed by signals). User-facing problems that
/// prevent any child from starting are written to `out` and reported through
/// the returned status. Only `fork`, `pipe` and `wait` failures are errors.
pub fn run_pipeline(
    pipeline: &Pipeline<'_>,
    redirections: &Redirections<'_>,
    out: &mut dyn Write,
) -> Result<Option<ExitCode>> {
    if redirections.same_file() {
        writeln!(out, "{SAME_FILE_MESSAGE}")?;
        return Ok(Some(EXIT_USAGE));
    }

    let specs = match prepare(pipeline, redirections) {
        Ok(specs) => specs,
        Err(err) => {
            debug!("cannot build argument vector: {err}");
            out.write_all(NOT_FOUND_MESSAGE.as_bytes())?;
            return Ok(Some(EXIT_NOT_FOUND));
        }
    };
    out.flush()?;

    match specs.len() {
        1 => run_single(&specs[0]),
        _ => run_stages(specs),
    }
}

/// Converts every stage to a spec, attaching the redirection files to the
/// first stage's input and the last stage's output.
fn prepare(
    pipeline: &Pipeline<'_>,
    redirections: &Redirections<'_>,
) -> Result<Vec<SpawnSpec>, NulError> {
    let mut specs = pipeline
        .stages()
        .iter()
        .map(SpawnSpec::new)
        .collect::<Result<Vec<_>, _>>()?;
    if let (Some(path), Some(first)) = (redirections.input, specs.first_mut()) {
        first.stdin = Endpoint::file(path)?;
    }
    if let (Some(path), Some(last)) = (redirections.output, specs.last_mut()) {
        last.stdout = Endpoint::file(path)?;
    }
    Ok(specs)
}

fn run_single(spec: &SpawnSpec) -> Result<Option<ExitCode>> {
    let child = spec.launch()?;
    let status = syscall(|| waitpid(child, None)).context("failed to wait for child")?;
    Ok(exit_code(status))
}

/// Starts stages in order, each reading the previous stage's pipe, then
/// collects all of them in whatever order they finish.
fn run_stages(mut specs: Vec<SpawnSpec>) -> Result<Option<ExitCode>> {
    let count = specs.len();
    let mut previous: Option<OwnedFd> = None;

    for (i, spec) in specs.iter_mut().enumerate() {
        let channel = if i + 1 < count {
            Some(pipe().context("failed to create pipe")?)
        } else {
            None
        };

        if let Some(read) = &previous {
            spec.stdin = Endpoint::Pipe(read.as_raw_fd());
        }
        if let Some((read, write)) = &channel {
            spec.stdout = Endpoint::Pipe(write.as_raw_fd());
            spec.close.push(read.as_raw_fd());
        }

        spec.launch()?;

        // The child holds its own copies now; the write end must close in the
        // parent or the next stage never sees end-of-file.
        previous = channel.map(|(read, _write)| read);
    }
    drop(previous);

    let mut last = None;
    for _ in 0..count {
        let status = syscall(wait).context("failed to wait for pipeline stage")?;
        if let Some(code) = exit_code(status) {
            last = Some(code);
        }
    }
    Ok(last)
}

fn exit_code(status: WaitStatus) -> Option<ExitCode> {
    match status {
        WaitStatus::Exited(pid, code) => {
            debug!("pid {pid} exited with {code}");
            Some(code)
        }
        WaitStatus::Signaled(pid, signal, _) => {
            warn!("pid {pid} was terminated by {signal:?}");
            None
        }
        other => {
            debug!("unexpected wait status {other:?}");
            None
        }
    }
}
