use crate::env::Environment;
use anyhow::Result;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// One parsed input line: dequoted tokens in the order they were typed.
///
/// Token 0 names the command; redirection operators stay in place until the
/// launcher partitions them out. Tokens are raw bytes and need not be UTF-8.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    tokens: Vec<OsString>,
}

impl Command {
    /// Builds a command from already tokenized words. Empty words are dropped.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(Into::into)
                .filter(|t: &OsString| !t.is_empty())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn token(&self, index: usize) -> Option<&OsStr> {
        self.tokens.get(index).map(OsString::as_os_str)
    }

    pub fn tokens(&self) -> &[OsString] {
        &self.tokens
    }

    /// The first token, i.e. the command name.
    pub fn name(&self) -> Option<&OsStr> {
        self.token(0)
    }

    /// Everything after the command name.
    pub fn args(&self) -> &[OsString] {
        self.tokens.get(1..).unwrap_or(&[])
    }
}

impl fmt::Display for Command {
    /// Debug-style listing of every token, one per line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} tokens:", self.tokens.len())?;
        for token in &self.tokens {
            writeln!(f, "{token:?}")?;
        }
        Ok(())
    }
}

/// Object-safe trait for a built-in ready to run inside the shell process.
pub trait ExecutableCommand {
    /// Executes the command. Errors are reported by the caller on stderr.
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`.
pub trait CommandFactory {
    /// Attempt to create a command instance for the provided name and arguments.
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>>;
}
