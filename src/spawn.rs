//! Glue between the builder types and `std::process`.
//!
//! Everything here is crate-internal: the pipeline engine and
//! [`Command::start`](crate::Command::start) hand resolved stream handles to
//! [`spawn_stage`], which assembles and launches one `std::process::Command`.

use crate::command::Command;
use crate::config::Redirect;
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{PipeReader, PipeWriter};
use std::process::{Child, ExitStatus, Stdio};
use tracing::debug;

/// The engine's ownership of one stage's stdin side.
///
/// A handle is released exactly once, by value, into the spawn call that
/// consumes it; dropping an unreleased handle on an error path closes it.
/// Either way the parent keeps no copy once the stage is running, which is
/// what lets upstream processes observe end-of-file.
#[derive(Debug)]
pub(crate) enum InputHandle {
    /// Inherit this process's stdin; nothing to close.
    Inherit,
    /// Redirect from the null device.
    Null,
    /// Give the child a fresh pipe and expose its write end on the handle.
    Piped,
    /// Read end of an anonymous pipe owned by the engine.
    Pipe(PipeReader),
    /// An open file, read from the current position.
    File(File),
}

impl InputHandle {
    /// Release the handle into a `Stdio` for exactly one spawn.
    fn release(self) -> Stdio {
        match self {
            InputHandle::Inherit => Stdio::inherit(),
            InputHandle::Null => Stdio::null(),
            InputHandle::Piped => Stdio::piped(),
            InputHandle::Pipe(reader) => reader.into(),
            InputHandle::File(file) => file.into(),
        }
    }
}

/// Resolved stdout destination for one stage.
#[derive(Debug)]
pub(crate) enum OutputTarget {
    Inherit,
    Null,
    File(File),
    /// Write end of an anonymous pipe; the matching read end feeds either
    /// the next stage or the capture buffer.
    Pipe(PipeWriter),
}

impl OutputTarget {
    /// A `Stdio` for this target. Duplicates the underlying handle rather
    /// than consuming it, since a joined stderr needs a second copy.
    fn stdio(&self) -> Result<Stdio> {
        Ok(match self {
            OutputTarget::Inherit => Stdio::inherit(),
            OutputTarget::Null => Stdio::null(),
            OutputTarget::File(file) => file.try_clone()?.into(),
            OutputTarget::Pipe(writer) => writer.try_clone()?.into(),
        })
    }

    /// The `Stdio` a joined stderr should use: the same destination as
    /// stdout. With an inherited stdout that destination is this process's
    /// own stdout, not its stderr.
    fn joined(&self) -> Result<Stdio> {
        match self {
            OutputTarget::Inherit => dup_stdout(),
            target => target.stdio(),
        }
    }
}

#[cfg(unix)]
fn dup_stdout() -> Result<Stdio> {
    use std::os::fd::AsFd;
    let fd = std::io::stdout().as_fd().try_clone_to_owned()?;
    Ok(fd.into())
}

#[cfg(not(unix))]
fn dup_stdout() -> Result<Stdio> {
    Ok(Stdio::inherit())
}

/// Spawn one stage without waiting for it.
///
/// The parent-side copies of the stdin handle and the stdout target are both
/// closed before this function returns, on success and on error alike; the
/// child keeps its own descriptors.
pub(crate) fn spawn_stage(
    command: &Command,
    input: InputHandle,
    output: OutputTarget,
) -> Result<Child> {
    let argv = command.flatten();
    debug!(argv = ?argv, "spawning stage");

    let mut cmd = std::process::Command::new(&argv[0]);
    cmd.args(&argv[1..]);
    let config = command.config();
    if let Some(dir) = config.cwd() {
        cmd.current_dir(dir);
    }
    if let Some(vars) = &config.env {
        cmd.envs(vars);
    }
    match config.stderr() {
        None => {}
        Some(Redirect::Join) => {
            cmd.stderr(output.joined()?);
        }
        Some(Redirect::Discard) => {
            cmd.stderr(Stdio::null());
        }
        Some(Redirect::Capture) => {
            cmd.stderr(Stdio::piped());
        }
        Some(Redirect::ToFile(path)) => {
            cmd.stderr(File::create(path)?);
        }
    }
    cmd.stdin(input.release());
    cmd.stdout(output.stdio()?);
    drop(output);

    cmd.spawn().map_err(|source| Error::Spawn {
        program: command.program().to_string(),
        source,
    })
}

/// Map an exit status to a conventional shell exit code: the process's own
/// code when it exited, `128 + signal` when a signal terminated it.
pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    match status.code() {
        Some(code) => code,
        None => signal_code(status),
    }
}

#[cfg(unix)]
fn signal_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn signal_code(_status: ExitStatus) -> i32 {
    -1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn exit_code_prefers_the_process_code() {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(exit_code(ExitStatus::from_raw(3 << 8)), 3);
    }

    #[test]
    #[cfg(unix)]
    fn signal_termination_maps_to_128_plus_signal() {
        use std::os::unix::process::ExitStatusExt;
        // raw wait status 9 == killed by SIGKILL
        assert_eq!(exit_code(ExitStatus::from_raw(9)), 128 + 9);
    }
}
