use std::ffi::OsString;
use std::io;
use std::process::ExitStatus;
use thiserror::Error;

/// Convenient result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while building or running a pipeline.
///
/// The first four variants are configuration errors: programmer mistakes that
/// surface at the call that made them, never retried. `Spawn` and
/// `ProcessFailure` come out of the execution engine, and `Io` passes
/// filesystem and pipe failures through unchanged.
#[derive(Debug, Error)]
pub enum Error {
    /// A pipeline's input source may be attached exactly once.
    #[error("pipeline input is already attached")]
    InputAlreadySet,

    /// `join()` requires that stderr has not been configured yet.
    #[error("stderr is already configured; join() requires it unset")]
    StderrConfigured,

    /// The generic setter was called with a name outside the parameter table.
    #[error("unrecognized launch parameter `{0}`")]
    UnknownParameter(String),

    /// A recognized parameter was given a value of the wrong shape.
    #[error("launch parameter `{name}` expects {expected}")]
    ParameterType {
        name: &'static str,
        expected: &'static str,
    },

    /// The operating system could not start the program.
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The terminal stage of a pipeline exited with a non-zero status.
    ///
    /// Carries the resolved argument vector and any output captured before
    /// the failure, for diagnostics.
    #[error("`{}` exited with {status}", render_argv(.argv))]
    ProcessFailure {
        argv: Vec<OsString>,
        status: ExitStatus,
        stdout: Option<Vec<u8>>,
    },

    /// Filesystem or pipe failure, surfaced as-is.
    #[error(transparent)]
    Io(#[from] io::Error),
}

fn render_argv(argv: &[OsString]) -> String {
    let words: Vec<_> = argv.iter().map(|arg| arg.to_string_lossy()).collect();
    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_failure_message_shows_argv() {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            let error = Error::ProcessFailure {
                argv: vec!["grep".into(), "--regexp=foo".into()],
                status: ExitStatus::from_raw(1 << 8),
                stdout: None,
            };
            let message = error.to_string();
            assert!(
                message.starts_with("`grep --regexp=foo` exited with"),
                "unexpected message: {message}"
            );
        }
    }

    #[test]
    fn io_errors_pass_through() {
        let inner = io::Error::new(io::ErrorKind::NotFound, "gone");
        let error = Error::from(inner);
        assert!(matches!(error, Error::Io(_)));
        assert_eq!(error.to_string(), "gone");
    }
}
