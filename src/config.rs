use crate::error::{Error, Result};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Explicit redirection target for one standard stream.
///
/// Absence of a redirect means the stream is inherited from this process.
#[derive(Debug, Clone, PartialEq)]
pub enum Redirect {
    /// Create a pipe and collect the stream's bytes.
    Capture,
    /// Redirect to the null device.
    Discard,
    /// Open the named file (create/truncate for output, read-only for input).
    ToFile(PathBuf),
    /// Send stderr to the same destination as stdout. Only valid for stderr.
    Join,
}

/// A value accepted by the generic launch-parameter setter.
#[derive(Debug, Clone)]
pub enum ConfigValue {
    Path(PathBuf),
    Env(IndexMap<String, String>),
    Redirect(Redirect),
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Path(value.into())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Path(value.into())
    }
}

impl From<&Path> for ConfigValue {
    fn from(value: &Path) -> Self {
        ConfigValue::Path(value.to_path_buf())
    }
}

impl From<PathBuf> for ConfigValue {
    fn from(value: PathBuf) -> Self {
        ConfigValue::Path(value)
    }
}

impl From<Redirect> for ConfigValue {
    fn from(value: Redirect) -> Self {
        ConfigValue::Redirect(value)
    }
}

impl From<IndexMap<String, String>> for ConfigValue {
    fn from(value: IndexMap<String, String>) -> Self {
        ConfigValue::Env(value)
    }
}

impl<K: Into<String>, V: Into<String>> From<Vec<(K, V)>> for ConfigValue {
    fn from(vars: Vec<(K, V)>) -> Self {
        ConfigValue::Env(
            vars.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// An immutable accumulator of process-spawn parameters.
///
/// Recognized parameters are the working directory, an environment override
/// map (applied on top of the inherited environment at spawn time) and the
/// three standard-stream redirects. Refinement always produces a new value;
/// the last write to a parameter wins.
#[derive(Debug, Clone, Default)]
pub struct LaunchConfig {
    pub(crate) cwd: Option<PathBuf>,
    pub(crate) env: Option<IndexMap<String, String>>,
    pub(crate) stdin: Option<Redirect>,
    pub(crate) stdout: Option<Redirect>,
    pub(crate) stderr: Option<Redirect>,
}

type Apply = fn(&mut LaunchConfig, ConfigValue) -> Result<()>;

/// The generic setter's dispatch table, looked up by name at call time.
const PARAMETERS: &[(&str, Apply)] = &[
    ("cwd", apply_cwd),
    ("env", apply_env),
    ("stdin", apply_stdin),
    ("stdout", apply_stdout),
    ("stderr", apply_stderr),
];

fn apply_cwd(config: &mut LaunchConfig, value: ConfigValue) -> Result<()> {
    match value {
        ConfigValue::Path(path) => {
            config.cwd = Some(path);
            Ok(())
        }
        _ => Err(Error::ParameterType {
            name: "cwd",
            expected: "a directory path",
        }),
    }
}

fn apply_env(config: &mut LaunchConfig, value: ConfigValue) -> Result<()> {
    match value {
        ConfigValue::Env(vars) => {
            config
                .env
                .get_or_insert_with(IndexMap::new)
                .extend(vars);
            Ok(())
        }
        _ => Err(Error::ParameterType {
            name: "env",
            expected: "an environment map",
        }),
    }
}

fn apply_stdin(config: &mut LaunchConfig, value: ConfigValue) -> Result<()> {
    config.stdin = Some(stream_redirect("stdin", value)?);
    Ok(())
}

fn apply_stdout(config: &mut LaunchConfig, value: ConfigValue) -> Result<()> {
    config.stdout = Some(stream_redirect("stdout", value)?);
    Ok(())
}

fn apply_stderr(config: &mut LaunchConfig, value: ConfigValue) -> Result<()> {
    match value {
        ConfigValue::Redirect(redirect) => {
            config.stderr = Some(redirect);
            Ok(())
        }
        _ => Err(Error::ParameterType {
            name: "stderr",
            expected: "a redirect",
        }),
    }
}

/// `Join` only makes sense for stderr; the other streams take the rest.
fn stream_redirect(name: &'static str, value: ConfigValue) -> Result<Redirect> {
    match value {
        ConfigValue::Redirect(Redirect::Join) => Err(Error::ParameterType {
            name,
            expected: "capture, discard, or a file path",
        }),
        ConfigValue::Redirect(redirect) => Ok(redirect),
        _ => Err(Error::ParameterType {
            name,
            expected: "a redirect",
        }),
    }
}

impl LaunchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one spawn parameter by name, returning a new configuration.
    ///
    /// Names outside the parameter table are configuration errors, as are
    /// values of the wrong shape for a recognized name.
    pub fn set(&self, name: &str, value: impl Into<ConfigValue>) -> Result<Self> {
        for (parameter, apply) in PARAMETERS {
            if *parameter == name {
                let mut next = self.clone();
                apply(&mut next, value.into())?;
                return Ok(next);
            }
        }
        Err(Error::UnknownParameter(name.to_string()))
    }

    /// A new configuration with the working directory replaced.
    pub fn with_cwd(&self, dir: impl Into<PathBuf>) -> Self {
        let mut next = self.clone();
        next.cwd = Some(dir.into());
        next
    }

    /// A new configuration with `vars` merged into the accumulated
    /// environment overrides (right-hand side wins per key).
    pub fn with_env<K, V>(&self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut next = self.clone();
        next.env.get_or_insert_with(IndexMap::new).extend(
            vars.into_iter()
                .map(|(key, value)| (key.into(), value.into())),
        );
        next
    }

    /// Combine two configurations; parameters present on the right-hand
    /// side override the left wholesale.
    pub fn merge(&self, other: &LaunchConfig) -> Self {
        LaunchConfig {
            cwd: other.cwd.clone().or_else(|| self.cwd.clone()),
            env: other.env.clone().or_else(|| self.env.clone()),
            stdin: other.stdin.clone().or_else(|| self.stdin.clone()),
            stdout: other.stdout.clone().or_else(|| self.stdout.clone()),
            stderr: other.stderr.clone().or_else(|| self.stderr.clone()),
        }
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn stderr(&self) -> Option<&Redirect> {
        self.stderr.as_ref()
    }

    pub fn stdout(&self) -> Option<&Redirect> {
        self.stdout.as_ref()
    }

    pub fn stdin(&self) -> Option<&Redirect> {
        self.stdin.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_dispatches_through_the_table() {
        let config = LaunchConfig::new()
            .set("cwd", "/tmp")
            .expect("cwd is a recognized parameter");
        assert_eq!(config.cwd(), Some(Path::new("/tmp")));
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let error = LaunchConfig::new().set("bogus", "/tmp").unwrap_err();
        assert!(matches!(error, Error::UnknownParameter(name) if name == "bogus"));
    }

    #[test]
    fn wrong_value_shape_is_rejected() {
        let error = LaunchConfig::new()
            .set("cwd", Redirect::Discard)
            .unwrap_err();
        assert!(matches!(error, Error::ParameterType { name: "cwd", .. }));
    }

    #[test]
    fn join_is_stderr_only() {
        let error = LaunchConfig::new()
            .set("stdout", Redirect::Join)
            .unwrap_err();
        assert!(matches!(error, Error::ParameterType { name: "stdout", .. }));
        let config = LaunchConfig::new()
            .set("stderr", Redirect::Join)
            .expect("join is valid for stderr");
        assert_eq!(config.stderr(), Some(&Redirect::Join));
    }

    #[test]
    fn last_write_wins() {
        let config = LaunchConfig::new().with_cwd("/does/not/exist").with_cwd("/");
        assert_eq!(config.cwd(), Some(Path::new("/")));
    }

    #[test]
    fn env_merges_accumulate() {
        let config = LaunchConfig::new()
            .with_env([("A", "1"), ("B", "2")])
            .with_env([("B", "3")]);
        let env = config.env.as_ref().expect("overrides were recorded");
        assert_eq!(env.get("A").map(String::as_str), Some("1"));
        assert_eq!(env.get("B").map(String::as_str), Some("3"));
    }

    #[test]
    fn merge_overrides_per_parameter() {
        let left = LaunchConfig::new().with_cwd("/a").with_env([("X", "1")]);
        let right = LaunchConfig::new().with_cwd("/b");
        let merged = left.merge(&right);
        assert_eq!(merged.cwd(), Some(Path::new("/b")));
        // env only set on the left survives
        assert!(merged.env.is_some());
    }

    #[test]
    fn refinement_never_mutates_the_original() {
        let base = LaunchConfig::new();
        let _ = base.with_cwd("/tmp");
        assert!(base.cwd().is_none());
    }
}
