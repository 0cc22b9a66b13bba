use crate::builtin::default_builtins;
use crate::command::{Command, CommandFactory, ExitCode};
use crate::env::Environment;
use crate::external;
use crate::reader::{self, LineSource, ReadError};
use std::borrow::Cow;
use std::ffi::OsStr;
use std::io::{self, Write};

/// What the dispatcher did with a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A built-in ran inside the shell process.
    Handled,
    /// Token 0 is not a built-in; the launcher has to run it.
    NeedsExternal,
}

/// The shell: built-in table plus the shell-wide [`Environment`].
///
/// Example
/// ```
/// use cash::{Command, Dispatch, Environment, Interpreter};
/// let mut sh = Interpreter::new(Environment::new(false));
/// let mut out = Vec::new();
/// let mut err = Vec::new();
/// let res = sh.dispatch_with_output(&Command::new(["pwd"]), &mut out, &mut err);
/// assert_eq!(res, Dispatch::Handled);
/// assert!(out.ends_with(b"\n"));
/// ```
pub struct Interpreter {
    env: Environment,
    builtins: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    /// Create an interpreter with the default built-ins: `help`, `exit`, `cd`, `pwd`.
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            builtins: default_builtins(),
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Runs `command` as a built-in if token 0 names one.
    pub fn dispatch(&mut self, command: &Command) -> Dispatch {
        self.dispatch_with_output(command, &mut io::stdout(), &mut io::stderr())
    }

    /// [`dispatch`](Self::dispatch) with explicit output streams.
    pub fn dispatch_with_output(
        &mut self,
        command: &Command,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Dispatch {
        let Some(name) = command.name().and_then(OsStr::to_str) else {
            return Dispatch::NeedsExternal;
        };
        // built-in arguments go through argh, which only takes text
        let args: Vec<Cow<'_, str>> = command.args().iter().map(|a| a.to_string_lossy()).collect();
        let args: Vec<&str> = args.iter().map(|a| &**a).collect();

        let Some(builtin) = self
            .builtins
            .iter()
            .find_map(|factory| factory.try_create(name, &args))
        else {
            return Dispatch::NeedsExternal;
        };

        log::debug!("running builtin {name}");
        match builtin.execute(stdout, stderr, &mut self.env) {
            Ok(code) => log::debug!("builtin {name} finished with {code}"),
            Err(err) => report(stderr, format_args!("{err:#}")),
        }
        if let Err(err) = stdout.flush() {
            report(stderr, format_args!("{name}: {err}"));
        }
        Dispatch::Handled
    }

    /// Runs one command: built-in in-process, anything else as a child process.
    /// The child's exit status is not kept.
    pub fn execute(&mut self, command: &Command) {
        if command.is_empty() {
            return;
        }
        if self.dispatch(command) == Dispatch::Handled {
            return;
        }
        if let Err(err) = external::launch(command, &self.env) {
            report(&mut io::stderr(), format_args!("{err}"));
        }
    }

    /// The main loop: read, dispatch, repeat until `exit`, end of input or a
    /// read error. Returns the status the shell process should exit with.
    pub fn run(&mut self, source: &mut dyn LineSource) -> ExitCode {
        loop {
            let command = match reader::read_command(source) {
                Ok(Some(command)) => command,
                Ok(None) => return 0,
                Err(ReadError::Interrupted) => continue,
                Err(err) => {
                    eprintln!("[cash] {err}");
                    return 0;
                }
            };

            self.execute(&command);
            if let Some(code) = self.env.exit_code {
                log::debug!("exit requested with {code}");
                return code;
            }
        }
    }
}

/// Writes a diagnostic to the error channel; a failing stderr is ignored.
fn report(stderr: &mut dyn Write, message: std::fmt::Arguments<'_>) {
    let _ = writeln!(stderr, "cash: {message}");
}
