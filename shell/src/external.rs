use crate::command::Command;
use crate::env::Environment;
use std::ffi::{CString, OsStr, OsString};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus, Stdio};

/// Signals the interactive shell ignores. Every spawned program gets them
/// back at their default disposition before it starts.
pub const SHELL_IGNORED_SIGNALS: &[libc::c_int] = &[
    libc::SIGINT,
    libc::SIGQUIT,
    libc::SIGTERM,
    libc::SIGTSTP,
    libc::SIGCONT,
    libc::SIGTTIN,
    libc::SIGTTOU,
];

/// Errors that stop an external command from running.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    /// A redirection target could not be opened.
    #[error("{}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },
    /// No `PATH` entry holds an executable with this name.
    #[error("{0}: command not found")]
    NotFound(String),
    /// fork/exec failed.
    #[error("{program}: {source}")]
    Spawn { program: String, source: io::Error },
    #[error("wait: {0}")]
    Wait(io::Error),
}

/// A command line split into the program's argv and its redirections.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub argv: Vec<OsString>,
    pub stdin: Option<PathBuf>,
    pub stdout: Option<PathBuf>,
}

/// Removes `<` / `>` operators and their file operands from the tokens.
///
/// An operator without a following token is dropped without effect. When an
/// operator repeats, the later file wins.
pub fn parse_redirections(tokens: &[OsString]) -> LaunchPlan {
    let mut plan = LaunchPlan::default();
    let mut iter = tokens.iter();
    while let Some(token) = iter.next() {
        match token.as_bytes() {
            b"<" => {
                if let Some(file) = iter.next() {
                    plan.stdin = Some(PathBuf::from(file));
                }
            }
            b">" => {
                if let Some(file) = iter.next() {
                    plan.stdout = Some(PathBuf::from(file));
                }
            }
            _ => plan.argv.push(token.clone()),
        }
    }
    plan
}

/// Resolve a program name the way the shell executes it.
///
/// Behavior:
/// - Name containing `/`: used literally, no `PATH` search.
/// - Otherwise: each non-empty entry of the colon-separated `search_paths` is
///   joined with the name, and the first regular file the current user may
///   execute wins.
/// - Empty name or no `PATH`: `None`.
pub fn resolve_executable(name: &OsStr, search_paths: Option<&OsStr>) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    if name.as_bytes().contains(&b'/') {
        return Some(PathBuf::from(name));
    }
    search_paths?
        .as_bytes()
        .split(|&b| b == b':')
        .filter(|dir| !dir.is_empty())
        .map(|dir| Path::new(OsStr::from_bytes(dir)).join(name))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    if !path.metadata().map(|m| m.is_file()).unwrap_or(false) {
        return false;
    }
    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: `c_path` is a valid NUL-terminated string for the whole call.
    unsafe { libc::access(c_path.as_ptr(), libc::X_OK) == 0 }
}

/// Everything needed to start one child process.
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Path handed to exec.
    pub program: PathBuf,
    /// `argv[0]` as the user typed it.
    pub argv0: OsString,
    pub args: Vec<OsString>,
    pub stdin: Option<PathBuf>,
    pub stdout: Option<PathBuf>,
    /// Signals reset to `SIG_DFL` in the child before exec.
    pub default_signals: &'static [libc::c_int],
    pub current_dir: Option<PathBuf>,
    pub vars: Vec<(String, String)>,
}

impl SpawnConfig {
    pub fn new(program: impl Into<PathBuf>, argv0: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            argv0: argv0.into(),
            args: Vec::new(),
            stdin: None,
            stdout: None,
            default_signals: SHELL_IGNORED_SIGNALS,
            current_dir: None,
            vars: Vec::new(),
        }
    }

    /// Opens the redirection targets, forks, restores signal defaults in the
    /// child and execs the program.
    pub fn spawn(&self) -> Result<Child, LaunchError> {
        let stdin = match &self.stdin {
            Some(path) => Stdio::from(open_input(path)?),
            None => Stdio::inherit(),
        };
        let stdout = match &self.stdout {
            Some(path) => Stdio::from(open_output(path)?),
            None => Stdio::inherit(),
        };

        let mut cmd = std::process::Command::new(&self.program);
        cmd.arg0(&self.argv0)
            .args(&self.args)
            .stdin(stdin)
            .stdout(stdout)
            .envs(self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        let signals = self.default_signals;
        // SAFETY: the hook runs between fork and exec and only calls
        // signal(2), which is async-signal-safe.
        unsafe {
            cmd.pre_exec(move || {
                for &sig in signals {
                    if libc::signal(sig, libc::SIG_DFL) == libc::SIG_ERR {
                        return Err(io::Error::last_os_error());
                    }
                }
                Ok(())
            });
        }

        cmd.spawn().map_err(|source| LaunchError::Spawn {
            program: self.argv0.to_string_lossy().into_owned(),
            source,
        })
    }
}

fn open_input(path: &Path) -> Result<File, LaunchError> {
    File::open(path).map_err(|source| LaunchError::Open {
        path: path.to_owned(),
        source,
    })
}

fn open_output(path: &Path) -> Result<File, LaunchError> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o644)
        .open(path)
        .map_err(|source| LaunchError::Open {
            path: path.to_owned(),
            source,
        })
}

/// Runs a non-builtin command and blocks until its process exits.
///
/// Returns `Ok(None)` when only redirections were given and there was nothing
/// to run.
pub fn launch(command: &Command, env: &Environment) -> Result<Option<ExitStatus>, LaunchError> {
    let plan = parse_redirections(command.tokens());
    let Some((name, args)) = plan.argv.split_first() else {
        log::debug!("nothing to run in {:?}", command.tokens());
        return Ok(None);
    };

    let search_paths = env.get_var("PATH");
    let program = resolve_executable(name, search_paths.as_deref().map(OsStr::new))
        .ok_or_else(|| LaunchError::NotFound(name.to_string_lossy().into_owned()))?;
    log::debug!("resolved {name:?} to {}", program.display());

    let config = SpawnConfig {
        args: args.to_vec(),
        stdin: plan.stdin,
        stdout: plan.stdout,
        current_dir: Some(env.current_dir.clone()),
        vars: env
            .vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        ..SpawnConfig::new(program, name.clone())
    };

    let mut child = config.spawn()?;
    log::debug!("spawned {name:?} as pid {}", child.id());
    let status = child.wait().map_err(LaunchError::Wait)?;
    log::debug!("pid {} exited with {status}", child.id());
    Ok(Some(status))
}
