//! Build and run external-process pipelines with a fluent, immutable API.
//!
//! This crate replaces hand-built argument vectors and manual descriptor
//! plumbing with small composable values: a [`Shell`] is the root context,
//! a [`Command`] pairs a program with its arguments and launch
//! configuration, and a [`Pipeline`] connects commands stdout-to-stdin and
//! runs them all concurrently, waiting only on the final stage. Every
//! builder is immutable: refinement returns a new value, so commands can
//! be shared, specialized and composed freely, including across threads.
//!
//! ```
//! use ductwork::{Result, Shell};
//!
//! fn main() -> Result<()> {
//!     let sh = Shell::new().capture();
//!
//!     // echo hello | tr a-z A-Z, with the output captured
//!     let hello = sh.cmd("echo").arg("hello");
//!     let out = sh.run(hello.pipe(sh.cmd("tr").args(["a-z", "A-Z"])))?;
//!     assert_eq!(out.stdout(), Some(&b"HELLO\n"[..]));
//!
//!     // Options flatten by convention: -n for short names,
//!     // --long-name=value for long ones.
//!     let last = sh.cmd("tail").opt("n", 1);
//!     assert_eq!(last.flatten(), ["tail", "-n", "1"]);
//!     Ok(())
//! }
//! ```
//!
//! Failure of the terminal stage surfaces as [`Error::ProcessFailure`];
//! earlier stages follow shell pipe semantics and only feed their
//! successor. See [`Pipeline::write_to`] for the execution contract.

mod args;
mod command;
mod config;
mod error;
mod pipeline;
mod shell;
mod spawn;

pub use args::{Arg, ArgSet};
pub use command::{Command, Spawned};
pub use config::{ConfigValue, LaunchConfig, Redirect};
pub use error::{Error, Result};
pub use pipeline::{Pipeline, ProcessHandle, Sink, Source};
pub use shell::{OutputMode, Shell};
