use argh::FromArgs;
use cash::external::SHELL_IGNORED_SIGNALS;
use cash::reader::session_source;
use cash::{Environment, ExitCode, Interpreter, write_usage};
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

#[derive(FromArgs)]
/// The California Shell.
struct Args {
    #[argh(positional)]
    /// script to run instead of reading commands from standard input.
    script: Option<String>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    std::process::exit(run());
}

fn run() -> ExitCode {
    let argv: Vec<OsString> = std::env::args_os().collect();
    let rest = argv.get(1..).unwrap_or_default();

    // options are not supported; `-h`, `--help` and friends all print usage
    if rest.iter().any(|arg| arg.as_bytes().starts_with(b"-")) {
        return usage();
    }
    // argh checks the shape of the command line; the path itself is taken
    // from the raw argument so it need not be UTF-8
    let text: Vec<String> = rest.iter().map(|a| a.to_string_lossy().into_owned()).collect();
    let text: Vec<&str> = text.iter().map(String::as_str).collect();
    let script = match Args::from_args(&["cash"], &text) {
        Ok(Args { script: Some(_) }) => rest.first().map(PathBuf::from),
        Ok(Args { script: None }) => None,
        Err(_) => return usage(),
    };

    let file = match script.as_deref().map(File::open).transpose() {
        Ok(file) => file,
        Err(err) => {
            let path = script.unwrap_or_default();
            eprintln!("cash: {}: {err}", path.display());
            return 1;
        }
    };

    let env = Environment::new(file.is_none() && io::stdin().is_terminal());
    if env.interactive {
        ignore_job_control_signals();
    }
    log::debug!("starting shell, interactive: {}", env.interactive);
    let mut source = session_source(file, &env);
    Interpreter::new(env).run(source.as_mut())
}

fn usage() -> ExitCode {
    if let Err(err) = write_usage(&mut io::stdout()) {
        eprintln!("cash: {err}");
    }
    1
}

/// Keeps the interactive shell alive through keyboard interrupts and job
/// control stops. Children get the default dispositions back before exec.
fn ignore_job_control_signals() {
    for &signal in SHELL_IGNORED_SIGNALS {
        // SAFETY: installing SIG_IGN touches no Rust state and happens before
        // any child process or extra thread exists.
        let previous = unsafe { libc::signal(signal, libc::SIG_IGN) };
        if previous == libc::SIG_ERR {
            log::warn!("cannot ignore signal {signal}: {}", io::Error::last_os_error());
        }
    }
}
