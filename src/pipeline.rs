use crate::command::Command;
use crate::error::{Error, Result};
use crate::spawn::{self, InputHandle, OutputTarget};
use std::ffi::OsString;
use std::fmt;
use std::fs::File;
use std::io::{self, PipeReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use tracing::{debug, trace};

/// Where a pipeline's first stage reads its input from.
///
/// Built through `From` conversions: a `&str` is literal text, a `Vec<u8>`
/// is literal bytes, a `&Path`/`PathBuf` names a file to open read-only and
/// a [`File`] is used as-is (and closed by the engine once consumed).
#[derive(Debug)]
pub enum Source {
    Text(String),
    Bytes(Vec<u8>),
    Path(PathBuf),
    Handle(File),
}

impl From<&str> for Source {
    fn from(text: &str) -> Self {
        Source::Text(text.to_string())
    }
}

impl From<String> for Source {
    fn from(text: String) -> Self {
        Source::Text(text)
    }
}

impl From<&[u8]> for Source {
    fn from(bytes: &[u8]) -> Self {
        Source::Bytes(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Source {
    fn from(bytes: Vec<u8>) -> Self {
        Source::Bytes(bytes)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl From<File> for Source {
    fn from(file: File) -> Self {
        Source::Handle(file)
    }
}

/// Where a pipeline's final stage writes its output.
///
/// `Capture` collects the bytes on the returned [`ProcessHandle`];
/// `Discard` sends them to the null device (and the handle reports nothing
/// captured, distinct from capturing zero bytes); `Inherit` passes them
/// through to this process's stdout. A string or path names a file to
/// create/truncate; a [`File`] is written as-is.
#[derive(Debug)]
pub enum Sink {
    Inherit,
    Capture,
    Discard,
    Path(PathBuf),
    Handle(File),
}

impl From<&str> for Sink {
    fn from(path: &str) -> Self {
        Sink::Path(path.into())
    }
}

impl From<String> for Sink {
    fn from(path: String) -> Self {
        Sink::Path(path.into())
    }
}

impl From<&Path> for Sink {
    fn from(path: &Path) -> Self {
        Sink::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for Sink {
    fn from(path: PathBuf) -> Self {
        Sink::Path(path)
    }
}

impl From<File> for Sink {
    fn from(file: File) -> Self {
        Sink::Handle(file)
    }
}

/// A byte string names a file, same as a path.
#[cfg(unix)]
impl From<Vec<u8>> for Sink {
    fn from(path: Vec<u8>) -> Self {
        use std::os::unix::ffi::OsStringExt;
        Sink::Path(OsString::from_vec(path).into())
    }
}

/// An ordered sequence of commands connected stdout-to-stdin, plus an
/// optional input source for the first stage.
///
/// A pipeline is built by [`Command::pipe`] and grown with
/// [`Pipeline::pipe`]; it is never empty. The input source may be attached
/// exactly once, and execution consumes the pipeline, so an in-flight run
/// can never be re-entered.
#[derive(Debug)]
pub struct Pipeline {
    stages: Vec<Command>,
    input: Option<Source>,
}

impl From<Command> for Pipeline {
    fn from(command: Command) -> Self {
        Pipeline {
            stages: vec![command],
            input: None,
        }
    }
}

impl Pipeline {
    pub(crate) fn with_input(command: Command, source: Source) -> Self {
        Pipeline {
            stages: vec![command],
            input: Some(source),
        }
    }

    /// The commands in execution order.
    pub fn stages(&self) -> &[Command] {
        &self.stages
    }

    /// Append another stage; `next` reads what the current last stage
    /// writes. Pipe-composition is associative: only the stage order
    /// matters.
    pub fn pipe(mut self, next: Command) -> Self {
        self.stages.push(next);
        self
    }

    /// Attach the input source feeding the first stage.
    ///
    /// Fails with [`Error::InputAlreadySet`] if a source is already
    /// attached, before anything is spawned.
    pub fn read_from(mut self, source: impl Into<Source>) -> Result<Self> {
        if self.input.is_some() {
            return Err(Error::InputAlreadySet);
        }
        self.input = Some(source.into());
        Ok(self)
    }

    /// Run the pipeline with its final stage writing into `sink`.
    ///
    /// All stages run concurrently: every stage but the last is spawned
    /// without waiting, connected to its neighbor by an anonymous pipe, and
    /// only the final stage is waited on. A non-zero exit from the final
    /// stage is [`Error::ProcessFailure`]; a non-zero exit from any other
    /// stage is deliberately ignored, matching shell pipe semantics.
    pub fn write_to(self, sink: impl Into<Sink>) -> Result<ProcessHandle> {
        self.execute(sink.into())
    }

    /// Run the pipeline with inherited output; shorthand for
    /// `write_to(Sink::Inherit)`.
    pub fn check(self) -> Result<ProcessHandle> {
        self.execute(Sink::Inherit)
    }

    fn execute(self, sink: Sink) -> Result<ProcessHandle> {
        debug!(pipeline = %self, ?sink, "running pipeline");
        let mut input = resolve_source(self.input)?;
        let last = self.stages.len() - 1;
        let mut upstream = Vec::with_capacity(last);

        for stage in &self.stages[..last] {
            let (reader, writer) = io::pipe()?;
            trace!(program = stage.program(), "spawning intermediate stage");
            let child = spawn::spawn_stage(stage, input, OutputTarget::Pipe(writer))?;
            upstream.push(child);
            input = InputHandle::Pipe(reader);
        }

        let stage = &self.stages[last];
        let (target, capture) = resolve_sink(sink)?;
        let mut child = spawn::spawn_stage(stage, input, target)?;

        // Drain the capture pipe before waiting so a child that fills the
        // pipe buffer cannot deadlock against us.
        let captured = match capture {
            Some(mut reader) => {
                let mut buffer = Vec::new();
                reader.read_to_end(&mut buffer)?;
                Some(buffer)
            }
            None => None,
        };
        let status = child.wait()?;
        trace!(%status, "terminal stage finished");

        // Reap whatever upstream stages have already exited; never block on
        // one that is still running.
        for mut earlier in upstream {
            let _ = earlier.try_wait();
        }

        let argv = stage.flatten();
        if !status.success() {
            return Err(Error::ProcessFailure {
                argv,
                status,
                stdout: captured,
            });
        }
        Ok(ProcessHandle {
            argv,
            status,
            stdout: captured,
        })
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{stage}")?;
        }
        Ok(())
    }
}

/// Turn the optional input source into the first stage's stdin handle.
///
/// Literal text and bytes are written into a fresh pipe whose write end is
/// closed before any stage runs; inputs larger than the OS pipe buffer
/// should come from a file or handle instead.
fn resolve_source(source: Option<Source>) -> Result<InputHandle> {
    match source {
        None => Ok(InputHandle::Inherit),
        Some(Source::Text(text)) => prefilled_pipe(text.into_bytes()),
        Some(Source::Bytes(bytes)) => prefilled_pipe(bytes),
        Some(Source::Path(path)) => Ok(InputHandle::File(File::open(path)?)),
        Some(Source::Handle(file)) => Ok(InputHandle::File(file)),
    }
}

fn prefilled_pipe(bytes: Vec<u8>) -> Result<InputHandle> {
    let (reader, mut writer) = io::pipe()?;
    writer.write_all(&bytes)?;
    drop(writer);
    Ok(InputHandle::Pipe(reader))
}

fn resolve_sink(sink: Sink) -> Result<(OutputTarget, Option<PipeReader>)> {
    Ok(match sink {
        Sink::Inherit => (OutputTarget::Inherit, None),
        Sink::Discard => (OutputTarget::Null, None),
        Sink::Capture => {
            let (reader, writer) = io::pipe()?;
            (OutputTarget::Pipe(writer), Some(reader))
        }
        Sink::Path(path) => (OutputTarget::File(File::create(path)?), None),
        Sink::Handle(file) => (OutputTarget::File(file), None),
    })
}

/// The completed outcome of a pipeline or command run.
#[derive(Debug)]
pub struct ProcessHandle {
    argv: Vec<OsString>,
    status: ExitStatus,
    stdout: Option<Vec<u8>>,
}

impl ProcessHandle {
    pub(crate) fn new(argv: Vec<OsString>, status: ExitStatus, stdout: Option<Vec<u8>>) -> Self {
        Self {
            argv,
            status,
            stdout,
        }
    }

    /// The terminal stage's resolved argument vector.
    pub fn argv(&self) -> &[OsString] {
        &self.argv
    }

    pub fn status(&self) -> ExitStatus {
        self.status
    }

    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// A conventional shell exit code: the process's own code, or
    /// `128 + signal` when a signal terminated it.
    pub fn code(&self) -> i32 {
        spawn::exit_code(self.status)
    }

    /// The captured output of the terminal stage.
    ///
    /// `None` when the sink did not capture (inherit, discard, file);
    /// `Some` with an empty slice when it captured zero bytes.
    pub fn stdout(&self) -> Option<&[u8]> {
        self.stdout.as_deref()
    }

    /// Consume the handle and take the captured output.
    pub fn into_stdout(self) -> Option<Vec<u8>> {
        self.stdout
    }
}
