use crate::args::{Arg, ArgSet};
use crate::config::{ConfigValue, LaunchConfig, Redirect};
use crate::error::{Error, Result};
use crate::pipeline::{Pipeline, ProcessHandle, Sink, Source};
use crate::spawn::{self, InputHandle, OutputTarget};
use std::ffi::OsString;
use std::fmt;
use std::fs::File;
use std::io::{self, PipeReader, Read};
use std::path::PathBuf;
use std::process::Child;

/// One program invocation: a program name, a launch configuration and an
/// argument set.
///
/// `Command` is an immutable value. Every refinement (adding arguments,
/// setting launch parameters, joining stderr into stdout) returns a new
/// `Command` and leaves the original untouched, so a partially configured
/// command can be kept around and specialized many times.
///
/// Commands are created from a [`Shell`](crate::Shell), inherit its
/// accumulated configuration, and combine into [`Pipeline`]s with
/// [`pipe`](Command::pipe).
#[derive(Debug, Clone)]
pub struct Command {
    program: String,
    config: LaunchConfig,
    args: ArgSet,
}

impl Command {
    pub(crate) fn new(program: impl Into<String>, config: LaunchConfig) -> Self {
        Self {
            program: program.into(),
            config,
            args: ArgSet::new(),
        }
    }

    /// The program name or path this command will invoke.
    pub fn program(&self) -> &str {
        &self.program
    }

    pub(crate) fn config(&self) -> &LaunchConfig {
        &self.config
    }

    /// A new command with one positional argument appended.
    ///
    /// Accepts anything convertible to [`Arg`]; `None` and `false` values
    /// vanish during flattening, so conditions can be passed inline.
    pub fn arg(&self, value: impl Into<Arg>) -> Self {
        self.with_args(self.args.with_positional(value))
    }

    /// A new command with several positional arguments appended.
    pub fn args<I>(&self, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        let mut args = self.args.clone();
        for value in values {
            args = args.with_positional(value);
        }
        self.with_args(args)
    }

    /// A new command with a named option added; an existing option with the
    /// same name is overridden in place.
    pub fn opt(&self, name: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.with_args(self.args.with_option(name, value))
    }

    /// Shorthand for a boolean flag option: `flag("verbose")` flattens to
    /// `--verbose`.
    pub fn flag(&self, name: impl Into<String>) -> Self {
        self.opt(name, true)
    }

    /// A new command whose argument set is the combination of this one's
    /// and `other` (positionals appended, options overridden on collision).
    pub fn with_args_from(&self, other: &ArgSet) -> Self {
        self.with_args(self.args.merge(other))
    }

    /// Set one launch parameter by name through the generic setter table.
    ///
    /// `set("cwd", ..)` and `set("env", ..)` have the dedicated shorthands
    /// [`with_cwd`](Command::with_cwd) and [`with_env`](Command::with_env).
    pub fn set(&self, name: &str, value: impl Into<ConfigValue>) -> Result<Self> {
        Ok(self.with_config(self.config.set(name, value)?))
    }

    /// A new command running in `dir`. The last write wins.
    pub fn with_cwd(&self, dir: impl Into<PathBuf>) -> Self {
        self.with_config(self.config.with_cwd(dir))
    }

    /// A new command with `vars` merged into its environment overrides.
    pub fn with_env<K, V>(&self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.with_config(self.config.with_env(vars))
    }

    /// A new command whose stderr goes wherever its stdout goes.
    ///
    /// Fails with [`Error::StderrConfigured`] if stderr was already
    /// explicitly configured; the two settings are mutually exclusive.
    pub fn join(&self) -> Result<Self> {
        if self.config.stderr().is_some() {
            return Err(Error::StderrConfigured);
        }
        Ok(self.with_config(self.config.set("stderr", Redirect::Join)?))
    }

    /// Flatten into the literal argument vector: the program first, then
    /// options in insertion order, then positionals in sequence order.
    ///
    /// Pure and deterministic; see [`ArgSet`] for the token format contract.
    pub fn flatten(&self) -> Vec<OsString> {
        let mut argv = vec![OsString::from(&self.program)];
        self.args.flatten_into(&mut argv);
        argv
    }

    /// Spawn the process without waiting for it.
    ///
    /// The configured redirects are honored: a `Capture` stdout hands the
    /// read side back on the returned [`Spawned`], a `Capture` stdin leaves
    /// a writable `child.stdin`. Does not fail on non-zero exit; call
    /// [`Spawned::wait`] to collect the outcome.
    pub fn start(&self) -> Result<Spawned> {
        let input = match self.config.stdin() {
            None => InputHandle::Inherit,
            Some(Redirect::Capture) => InputHandle::Piped,
            Some(Redirect::Discard) => InputHandle::Null,
            Some(Redirect::ToFile(path)) => InputHandle::File(File::open(path)?),
            // the setter table rejects Join for stdin
            Some(Redirect::Join) => InputHandle::Inherit,
        };
        let (output, capture) = match self.config.stdout() {
            None => (OutputTarget::Inherit, None),
            Some(Redirect::Capture) => {
                let (reader, writer) = io::pipe()?;
                (OutputTarget::Pipe(writer), Some(reader))
            }
            Some(Redirect::Discard) => (OutputTarget::Null, None),
            Some(Redirect::ToFile(path)) => (OutputTarget::File(File::create(path)?), None),
            // the setter table rejects Join for stdout
            Some(Redirect::Join) => (OutputTarget::Inherit, None),
        };
        let argv = self.flatten();
        let child = spawn::spawn_stage(self, input, output)?;
        Ok(Spawned {
            argv,
            child,
            stdout: capture,
        })
    }

    /// Run the process to completion and fail on non-zero exit.
    ///
    /// The configured stdout redirect doubles as the sink, so
    /// `cmd.set("stdout", Redirect::Capture)?.check()?` hands the output
    /// back on the handle.
    pub fn check(&self) -> Result<ProcessHandle> {
        let sink = match self.config.stdout() {
            None => Sink::Inherit,
            Some(Redirect::Capture) => Sink::Capture,
            Some(Redirect::Discard) => Sink::Discard,
            Some(Redirect::ToFile(path)) => Sink::Path(path.clone()),
            // the setter table rejects Join for stdout
            Some(Redirect::Join) => Sink::Inherit,
        };
        Pipeline::from(self.clone()).write_to(sink)
    }

    /// Combine with another command into a two-stage pipeline; this
    /// command's stdout feeds `next`'s stdin.
    pub fn pipe(&self, next: Command) -> Pipeline {
        Pipeline::from(self.clone()).pipe(next)
    }

    /// A single-stage pipeline reading its input from `source`.
    pub fn read_from(&self, source: impl Into<Source>) -> Pipeline {
        Pipeline::with_input(self.clone(), source.into())
    }

    /// Run as a single-stage pipeline writing into `sink`.
    pub fn write_to(&self, sink: impl Into<Sink>) -> Result<ProcessHandle> {
        Pipeline::from(self.clone()).write_to(sink)
    }

    fn with_args(&self, args: ArgSet) -> Self {
        Self {
            program: self.program.clone(),
            config: self.config.clone(),
            args,
        }
    }

    fn with_config(&self, config: LaunchConfig) -> Self {
        Self {
            program: self.program.clone(),
            config,
            args: self.args.clone(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)
    }
}

/// A spawned, still-running command returned by [`Command::start`].
pub struct Spawned {
    argv: Vec<OsString>,
    child: Child,
    stdout: Option<PipeReader>,
}

impl Spawned {
    /// The underlying child process (for its pid, stdin handle, etc.).
    pub fn child(&mut self) -> &mut Child {
        &mut self.child
    }

    /// Take the read side of a captured stdout, if one was configured.
    pub fn take_stdout(&mut self) -> Option<PipeReader> {
        self.stdout.take()
    }

    /// Drain any captured output, then wait for the process to exit.
    ///
    /// Unlike [`Command::check`] this does not treat a non-zero exit as an
    /// error; inspect the returned handle instead.
    pub fn wait(mut self) -> Result<ProcessHandle> {
        let captured = match self.stdout.take() {
            Some(mut reader) => {
                let mut buffer = Vec::new();
                reader.read_to_end(&mut buffer)?;
                Some(buffer)
            }
            None => None,
        };
        let status = self.child.wait()?;
        Ok(ProcessHandle::new(self.argv, status, captured))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::Shell;

    fn words(argv: &[OsString]) -> Vec<String> {
        argv.iter()
            .map(|word| word.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn flatten_puts_the_program_first() {
        let cmd = Shell::new().cmd("grep").opt("regexp", "foo").arg("file");
        assert_eq!(words(&cmd.flatten()), ["grep", "--regexp=foo", "file"]);
    }

    #[test]
    fn flatten_twice_is_identical() {
        let cmd = Shell::new()
            .cmd("tar")
            .flag("verbose")
            .opt("f", "out.tar")
            .args(["a", "b"]);
        assert_eq!(cmd.flatten(), cmd.flatten());
    }

    #[test]
    fn refinement_leaves_the_original_alone() {
        let base = Shell::new().cmd("echo");
        let refined = base.arg("hello");
        assert_eq!(words(&base.flatten()), ["echo"]);
        assert_eq!(words(&refined.flatten()), ["echo", "hello"]);
    }

    #[test]
    fn later_options_override_in_place() {
        let cmd = Shell::new()
            .cmd("kubectl")
            .opt("namespace", "dev")
            .flag("watch")
            .opt("namespace", "prod");
        assert_eq!(
            words(&cmd.flatten()),
            ["kubectl", "--namespace=prod", "--watch"]
        );
    }

    #[test]
    fn with_args_from_combines_sets() {
        let extra = ArgSet::new().with_positional("b").with_option("n", 2);
        let cmd = Shell::new()
            .cmd("head")
            .opt("n", 1)
            .arg("a")
            .with_args_from(&extra);
        assert_eq!(words(&cmd.flatten()), ["head", "-n", "2", "a", "b"]);
    }

    #[test]
    fn join_conflicts_with_configured_stderr() {
        let cmd = Shell::new()
            .cmd("cc")
            .set("stderr", Redirect::Discard)
            .expect("stderr accepts discard");
        assert!(matches!(cmd.join(), Err(Error::StderrConfigured)));
    }

    #[test]
    fn join_twice_fails_fast() {
        let joined = Shell::new().cmd("cc").join().expect("first join is fine");
        assert!(matches!(joined.join(), Err(Error::StderrConfigured)));
    }

    #[test]
    fn unknown_parameter_fails_fast() {
        let error = Shell::new().cmd("ls").set("shell", "/bin/sh").unwrap_err();
        assert!(matches!(error, Error::UnknownParameter(name) if name == "shell"));
    }

    #[test]
    fn display_is_the_program_name() {
        assert_eq!(Shell::new().cmd("echo").to_string(), "echo");
    }

    #[test]
    #[cfg(unix)]
    fn start_does_not_check_the_exit_status() {
        let handle = Shell::new()
            .cmd("false")
            .start()
            .expect("false spawns fine")
            .wait()
            .expect("waiting succeeds even on failure");
        assert!(!handle.success());
    }

    #[test]
    #[cfg(unix)]
    fn start_with_captured_stdout_hands_back_the_output() {
        let handle = Shell::new()
            .cmd("echo")
            .arg("hi")
            .set("stdout", Redirect::Capture)
            .expect("stdout accepts capture")
            .start()
            .expect("echo spawns")
            .wait()
            .expect("echo exits");
        assert_eq!(handle.stdout(), Some(&b"hi\n"[..]));
    }

    #[test]
    #[cfg(unix)]
    fn check_raises_on_nonzero_exit() {
        let error = Shell::new().cmd("false").check().unwrap_err();
        match error {
            Error::ProcessFailure { status, .. } => assert_eq!(status.code(), Some(1)),
            other => panic!("expected a process failure, got {other:?}"),
        }
    }
}
