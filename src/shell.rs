use crate::command::Command;
use crate::config::{ConfigValue, LaunchConfig};
use crate::error::Result;
use crate::pipeline::{Pipeline, ProcessHandle, Sink};
use std::path::PathBuf;

/// What [`Shell::run`] does with the final stage's output by default.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum OutputMode {
    /// Pass output through to this process's stdout.
    #[default]
    Inherit,
    /// Collect output on the returned handle.
    Capture,
    /// Send output to the null device.
    Discard,
}

/// The root context commands and pipelines are created against.
///
/// A `Shell` owns an accumulated [`LaunchConfig`] and a default output
/// mode; every [`Command`] it creates inherits both the configuration and,
/// through [`run`](Shell::run), the output mode. Like every other builder
/// type here it is an immutable value: refinement returns a new `Shell`.
///
/// ```
/// use ductwork::{Result, Shell};
///
/// fn main() -> Result<()> {
///     let sh = Shell::new().capture();
///     let out = sh.run(sh.cmd("echo").arg("hello").pipe(sh.cmd("cat")))?;
///     assert_eq!(out.stdout(), Some(&b"hello\n"[..]));
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Shell {
    config: LaunchConfig,
    output: OutputMode,
}

impl Shell {
    /// A root context over the inherited process environment, passing
    /// output through.
    pub fn new() -> Self {
        Self::default()
    }

    /// A shell whose `run` collects output on the handle.
    pub fn capture(&self) -> Self {
        self.with_output(OutputMode::Capture)
    }

    /// A shell whose `run` sends output to the null device.
    pub fn discard(&self) -> Self {
        self.with_output(OutputMode::Discard)
    }

    /// A shell whose `run` passes output through (the default).
    pub fn inherit(&self) -> Self {
        self.with_output(OutputMode::Inherit)
    }

    /// Address a program by name or path.
    ///
    /// The returned command starts from this shell's accumulated
    /// configuration; later shell refinements do not touch it.
    pub fn cmd(&self, program: impl Into<String>) -> Command {
        Command::new(program, self.config.clone())
    }

    /// Set one launch parameter by name; see [`Command::set`].
    pub fn set(&self, name: &str, value: impl Into<ConfigValue>) -> Result<Self> {
        Ok(Self {
            config: self.config.set(name, value)?,
            output: self.output,
        })
    }

    /// A shell whose commands run in `dir` by default.
    pub fn with_cwd(&self, dir: impl Into<PathBuf>) -> Self {
        Self {
            config: self.config.with_cwd(dir),
            output: self.output,
        }
    }

    /// A shell with `vars` merged into the default environment overrides.
    pub fn with_env<K, V>(&self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            config: self.config.with_env(vars),
            output: self.output,
        }
    }

    /// Execute a command or pipeline with this shell's output mode as the
    /// sink, failing on a non-zero exit of the terminal stage.
    pub fn run(&self, pipeline: impl Into<Pipeline>) -> Result<ProcessHandle> {
        let sink = match self.output {
            OutputMode::Inherit => Sink::Inherit,
            OutputMode::Capture => Sink::Capture,
            OutputMode::Discard => Sink::Discard,
        };
        pipeline.into().write_to(sink)
    }

    fn with_output(&self, output: OutputMode) -> Self {
        Self {
            config: self.config.clone(),
            output,
        }
    }
}
