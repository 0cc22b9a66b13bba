use crate::command::ExitCode;
use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// Shell-wide state threaded through the interpreter, built-ins and launcher.
///
/// The environment contains:
/// - `vars`: a snapshot of environment variables, consulted for `HOME` and `PATH`
///   and passed on to spawned programs.
/// - `current_dir`: the working directory, kept in sync with the process by `cd`.
/// - `interactive`: whether prompts are shown (stdin is a terminal and no script).
/// - `exit_code`: set by the `exit` built-in; the main loop stops once it is `Some`.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
    /// True when the shell talks to a terminal.
    pub interactive: bool,
    /// Exit code requested by the `exit` built-in.
    pub exit_code: Option<ExitCode>,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    pub fn new(interactive: bool) -> Self {
        let vars = stdenv::vars().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            vars,
            current_dir,
            interactive,
            exit_code: None,
        }
    }

    /// Get the value of an environment variable.
    ///
    /// Looks up the key in `self.vars` first, falling back to `std::env::var`.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    /// Set or override an environment variable in `self.vars`.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    pub fn should_exit(&self) -> bool {
        self.exit_code.is_some()
    }
}
