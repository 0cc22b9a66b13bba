//! `cash`: a small interactive command shell.
//!
//! The shell reads commands from a terminal, a script file or a pipe, splits
//! them into words with POSIX-like quoting and escaping, runs built-ins (`cd`,
//! `pwd`, `exit`, `help`) in-process and starts every other program as a child
//! process with optional `<`/`>` redirection.
//!
//! The main entry point is [`Interpreter`], which runs commands read from any
//! [`LineSource`](reader::LineSource). The public modules [`command`],
//! [`env`], [`lexer`], [`reader`] and [`external`] expose the pieces it is made of.

mod builtin;
pub mod command;
pub mod env;
pub mod external;
mod interpreter;
pub mod lexer;
pub mod reader;

pub use builtin::{parse_exit_code, write_usage};
pub use command::{Command, ExitCode};
pub use env::Environment;
pub use interpreter::{Dispatch, Interpreter};
