//! A small interactive driver for the `ductwork` library.
//!
//! Reads one pipeline per line, `prog args.. | prog args.. < in > out`,
//! builds it through the library and runs it. Quoting is supported; there
//! are no variables, no globbing and no job control: this is a showcase for
//! the builder API, not a shell.

use anyhow::{Context, Result, bail};
use argh::FromArgs;
use ductwork::{Pipeline, Shell};
use regex::Regex;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::mem;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// Run process pipelines interactively or one-shot.
struct Cli {
    /// pipeline to run instead of starting the interactive prompt
    #[argh(option, short = 'c')]
    command: Option<String>,

    /// send pipeline output to the null device instead of the terminal
    #[argh(switch)]
    quiet: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli: Cli = argh::from_env();
    let shell = if cli.quiet {
        Shell::new().discard()
    } else {
        Shell::new()
    };
    match cli.command {
        Some(line) => run_line(&shell, &line),
        None => repl(&shell),
    }
}

fn repl(shell: &Shell) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("duct$ ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                editor.add_history_entry(line.as_str())?;
                if let Err(error) = run_line(shell, &line) {
                    eprintln!("{error:#}");
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(error) => return Err(error.into()),
        }
    }
    Ok(())
}

fn run_line(shell: &Shell, line: &str) -> Result<()> {
    let (pipeline, sink) = parse_line(shell, line)?;
    match sink {
        Some(path) => pipeline.write_to(path)?,
        None => shell.run(pipeline)?,
    };
    Ok(())
}

#[derive(Debug, PartialEq)]
enum Token {
    Word(String),
    Pipe,
    ReadFrom,
    WriteTo,
}

fn tokenize(line: &str) -> Result<Vec<Token>> {
    // Double-quoted word, single-quoted word, operator, bare word.
    let pattern = Regex::new(r#""([^"]*)"|'([^']*)'|([|<>])|([^\s|<>"']+)"#)?;
    let mut tokens = Vec::new();
    for capture in pattern.captures_iter(line) {
        if let Some(quoted) = capture.get(1).or_else(|| capture.get(2)) {
            tokens.push(Token::Word(quoted.as_str().to_string()));
        } else if let Some(operator) = capture.get(3) {
            tokens.push(match operator.as_str() {
                "|" => Token::Pipe,
                "<" => Token::ReadFrom,
                _ => Token::WriteTo,
            });
        } else if let Some(word) = capture.get(4) {
            tokens.push(Token::Word(word.as_str().to_string()));
        }
    }
    Ok(tokens)
}

/// Assemble a line's tokens into a pipeline plus an optional output path.
///
/// `< path` always feeds the first stage, wherever it appears on the line,
/// because a pipeline's input belongs to its head.
fn parse_line(shell: &Shell, line: &str) -> Result<(Pipeline, Option<String>)> {
    let mut stages: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut source: Option<String> = None;
    let mut sink: Option<String> = None;

    let mut tokens = tokenize(line)?.into_iter();
    while let Some(token) = tokens.next() {
        match token {
            Token::Word(word) => current.push(word),
            Token::Pipe => {
                if current.is_empty() {
                    bail!("empty pipeline stage");
                }
                stages.push(mem::take(&mut current));
            }
            Token::ReadFrom => {
                let Some(Token::Word(path)) = tokens.next() else {
                    bail!("expected a path after `<`");
                };
                if source.replace(path).is_some() {
                    bail!("input redirected twice");
                }
            }
            Token::WriteTo => {
                let Some(Token::Word(path)) = tokens.next() else {
                    bail!("expected a path after `>`");
                };
                if sink.replace(path).is_some() {
                    bail!("output redirected twice");
                }
            }
        }
    }
    if current.is_empty() {
        bail!("empty pipeline stage");
    }
    stages.push(current);

    let mut pipeline: Option<Pipeline> = None;
    for words in stages {
        let mut words = words.into_iter();
        let program = words.next().context("empty pipeline stage")?;
        let mut command = shell.cmd(program);
        for word in words {
            command = command.arg(word);
        }
        pipeline = Some(match pipeline {
            None => Pipeline::from(command),
            Some(pipeline) => pipeline.pipe(command),
        });
    }
    let mut pipeline = pipeline.context("empty pipeline")?;
    if let Some(path) = source {
        pipeline = pipeline.read_from(PathBuf::from(path))?;
    }
    Ok((pipeline, sink))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_handles_quotes_and_operators() {
        let tokens = tokenize(r#"grep "a b" 'c d' | wc -l > out.txt"#).expect("tokenizes");
        assert_eq!(
            tokens,
            vec![
                Token::Word("grep".into()),
                Token::Word("a b".into()),
                Token::Word("c d".into()),
                Token::Pipe,
                Token::Word("wc".into()),
                Token::Word("-l".into()),
                Token::WriteTo,
                Token::Word("out.txt".into()),
            ]
        );
    }

    #[test]
    fn parse_builds_the_pipeline_in_order() {
        let shell = Shell::new();
        let (pipeline, sink) =
            parse_line(&shell, "echo hello | tr a-z A-Z > out.txt").expect("parses");
        assert_eq!(pipeline.to_string(), "echo | tr");
        assert_eq!(sink.as_deref(), Some("out.txt"));
    }

    #[test]
    fn empty_stages_are_rejected() {
        let shell = Shell::new();
        assert!(parse_line(&shell, "echo hello | | wc").is_err());
        assert!(parse_line(&shell, "| wc").is_err());
        assert!(parse_line(&shell, "echo hello |").is_err());
    }

    #[test]
    fn double_input_redirect_is_rejected() {
        let shell = Shell::new();
        assert!(parse_line(&shell, "cat < a < b").is_err());
    }

    #[test]
    fn missing_redirect_target_is_rejected() {
        let shell = Shell::new();
        assert!(parse_line(&shell, "echo hello >").is_err());
    }
}
