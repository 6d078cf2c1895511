use indexmap::IndexMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// A single argument value, one variant per accepted shape.
///
/// Most call sites never name this type: `From` conversions cover strings,
/// numbers, booleans, paths, `Option<T>` (where `None` means [`Arg::Skip`])
/// and `Vec<T>` (a one-level sequence). Raw byte arguments are built with
/// [`Arg::bytes`].
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Emits nothing when flattened. Lets call sites pass conditional
    /// arguments without branching: `cmd.arg(verbose.then(|| "-v"))`.
    Skip,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Path(PathBuf),
    /// Expanded one level when flattened; a `Seq` nested inside another
    /// `Seq` collapses into a single token instead of expanding further.
    Seq(Vec<Arg>),
}

impl Arg {
    /// A raw byte-string argument, passed to the program verbatim.
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Arg::Bytes(bytes.into())
    }

    /// Render this value as one argv token.
    fn token(&self) -> OsString {
        match self {
            Arg::Skip => OsString::new(),
            Arg::Bool(value) => value.to_string().into(),
            Arg::Int(value) => value.to_string().into(),
            Arg::Float(value) => value.to_string().into(),
            Arg::Str(value) => value.clone().into(),
            Arg::Bytes(bytes) => bytes_token(bytes),
            Arg::Path(path) => path.clone().into_os_string(),
            Arg::Seq(items) => {
                // One level only: a nested sequence becomes a single token.
                let mut token = OsString::new();
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        token.push(" ");
                    }
                    token.push(item.token());
                }
                token
            }
        }
    }
}

#[cfg(unix)]
fn bytes_token(bytes: &[u8]) -> OsString {
    use std::os::unix::ffi::OsStringExt;
    OsString::from_vec(bytes.to_vec())
}

#[cfg(not(unix))]
fn bytes_token(bytes: &[u8]) -> OsString {
    String::from_utf8_lossy(bytes).into_owned().into()
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Str(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Str(value)
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Arg::Bool(value)
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Arg::Int(value.into())
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Arg::Int(value)
    }
}

impl From<u32> for Arg {
    fn from(value: u32) -> Self {
        Arg::Int(value.into())
    }
}

impl From<usize> for Arg {
    fn from(value: usize) -> Self {
        Arg::Int(value as i64)
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Float(value)
    }
}

impl From<&Path> for Arg {
    fn from(value: &Path) -> Self {
        Arg::Path(value.to_path_buf())
    }
}

impl From<PathBuf> for Arg {
    fn from(value: PathBuf) -> Self {
        Arg::Path(value)
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(inner) => inner.into(),
            None => Arg::Skip,
        }
    }
}

impl<T: Into<Arg>> From<Vec<T>> for Arg {
    fn from(values: Vec<T>) -> Self {
        Arg::Seq(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Arg> + Clone> From<&[T]> for Arg {
    fn from(values: &[T]) -> Self {
        Arg::Seq(values.iter().cloned().map(Into::into).collect())
    }
}

/// Render an option name the conventional way: `-k` for single-character
/// names, `--kebab-case` otherwise (underscores become hyphens).
pub(crate) fn option_name(name: &str) -> String {
    if name.chars().count() == 1 {
        format!("-{name}")
    } else {
        format!("--{}", name.replace('_', "-"))
    }
}

/// An immutable accumulator of positional values and named options.
///
/// Every operation returns a new `ArgSet`; no set is mutated after creation.
/// Options keep their insertion order, and merging preserves the position of
/// the first insertion while the right-hand value wins on a name collision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgSet {
    positional: Vec<Arg>,
    options: IndexMap<String, Arg>,
}

impl ArgSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.options.is_empty()
    }

    /// A new set with one more positional value appended.
    pub fn with_positional(&self, value: impl Into<Arg>) -> Self {
        let mut next = self.clone();
        next.positional.push(value.into());
        next
    }

    /// A new set with one named option added, overriding any previous value
    /// under the same name.
    pub fn with_option(&self, name: impl Into<String>, value: impl Into<Arg>) -> Self {
        let mut next = self.clone();
        next.options.insert(name.into(), value.into());
        next
    }

    /// Combine two sets: positionals append, options merge with the
    /// right-hand side overriding on a name collision.
    pub fn merge(&self, other: &ArgSet) -> Self {
        let mut next = self.clone();
        next.positional.extend(other.positional.iter().cloned());
        for (name, value) in &other.options {
            next.options.insert(name.clone(), value.clone());
        }
        next
    }

    /// Flatten options (insertion order) then positionals (sequence order)
    /// into literal argv tokens.
    ///
    /// Option format contract: a `true` value emits a bare flag; any other
    /// value emits `-k v` as two tokens for single-character names and
    /// `--long-name=v` as one token otherwise. An option whose value is
    /// [`Arg::Skip`] is omitted entirely.
    pub(crate) fn flatten_into(&self, argv: &mut Vec<OsString>) {
        for (name, value) in &self.options {
            match value {
                Arg::Skip => {}
                Arg::Bool(true) => argv.push(option_name(name).into()),
                value if name.chars().count() == 1 => {
                    argv.push(option_name(name).into());
                    argv.push(value.token());
                }
                value => {
                    let mut token = OsString::from(option_name(name));
                    token.push("=");
                    token.push(value.token());
                    argv.push(token);
                }
            }
        }
        for value in &self.positional {
            match value {
                Arg::Skip | Arg::Bool(false) => {}
                Arg::Seq(items) => argv.extend(items.iter().map(Arg::token)),
                value => argv.push(value.token()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flatten(args: &ArgSet) -> Vec<String> {
        let mut argv = Vec::new();
        args.flatten_into(&mut argv);
        argv.into_iter()
            .map(|token| token.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn short_flag() {
        let args = ArgSet::new().with_option("x", true);
        assert_eq!(flatten(&args), ["-x"]);
    }

    #[test]
    fn long_flag_is_kebab_cased() {
        let args = ArgSet::new().with_option("foo_bar", true);
        assert_eq!(flatten(&args), ["--foo-bar"]);
    }

    #[test]
    fn valued_short_option_uses_two_tokens() {
        let args = ArgSet::new().with_option("c", "v");
        assert_eq!(flatten(&args), ["-c", "v"]);
    }

    #[test]
    fn valued_long_option_uses_inline_equals() {
        let args = ArgSet::new().with_option("regexp", "foo");
        assert_eq!(flatten(&args), ["--regexp=foo"]);
    }

    #[test]
    fn skipped_option_is_omitted() {
        let args = ArgSet::new()
            .with_option("color", Option::<&str>::None)
            .with_option("n", 1);
        assert_eq!(flatten(&args), ["-n", "1"]);
    }

    #[test]
    fn false_and_none_positionals_are_dropped() {
        let args = ArgSet::new()
            .with_positional(false)
            .with_positional("a")
            .with_positional(Option::<&str>::None)
            .with_positional("b");
        assert_eq!(flatten(&args), ["a", "b"]);
    }

    #[test]
    fn sequences_expand_one_level() {
        let args = ArgSet::new()
            .with_positional("a")
            .with_positional(vec!["b", "c"])
            .with_positional("d");
        assert_eq!(flatten(&args), ["a", "b", "c", "d"]);
    }

    #[test]
    fn nested_sequence_collapses_to_one_token() {
        let args = ArgSet::new().with_positional(Arg::Seq(vec![
            Arg::from("a"),
            Arg::Seq(vec![Arg::from("b"), Arg::from("c")]),
        ]));
        assert_eq!(flatten(&args), ["a", "b c"]);
    }

    #[test]
    fn numbers_use_canonical_text() {
        let args = ArgSet::new().with_positional(7).with_positional(1.5);
        assert_eq!(flatten(&args), ["7", "1.5"]);
    }

    #[test]
    fn options_come_before_positionals_in_insertion_order() {
        let args = ArgSet::new()
            .with_positional("file")
            .with_option("n", true)
            .with_option("regexp", "x");
        assert_eq!(flatten(&args), ["-n", "--regexp=x", "file"]);
    }

    #[test]
    fn merge_appends_positionals_and_overrides_options_in_place() {
        let left = ArgSet::new()
            .with_positional("a")
            .with_option("first", "1")
            .with_option("second", "2");
        let right = ArgSet::new().with_positional("b").with_option("first", "9");
        let merged = left.merge(&right);
        // The overridden option keeps its original slot.
        assert_eq!(flatten(&merged), ["--first=9", "--second=2", "a", "b"]);
    }

    #[test]
    fn merge_leaves_operands_untouched() {
        let left = ArgSet::new().with_positional("a");
        let right = ArgSet::new().with_positional("b");
        let _ = left.merge(&right);
        assert_eq!(flatten(&left), ["a"]);
        assert_eq!(flatten(&right), ["b"]);
    }

    #[test]
    fn flattening_is_deterministic() {
        let args = ArgSet::new()
            .with_option("regexp", "foo")
            .with_positional(vec!["a", "b"]);
        assert_eq!(flatten(&args), flatten(&args));
    }
}
