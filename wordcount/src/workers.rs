//! Fan-out strategies: count every file on its own worker, then merge.
//!
//! Files that cannot be opened are reported on stderr and skipped; only
//! failures of the fan-out machinery itself (pipe, fork) abort the run.

use crate::counts::{CountsError, WordCounts, count_file, count_file_with, word_pattern};
use regex::bytes::Regex;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::os::fd::{FromRawFd, OwnedFd};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;

/// How the input files are spread over workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// One file after the other in the calling thread.
    #[default]
    Single,
    /// One scoped thread per file.
    Threads,
    /// One forked child per file, reporting back through a pipe.
    Processes,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Mode::Single),
            "threads" => Ok(Mode::Threads),
            "processes" => Ok(Mode::Processes),
            other => Err(format!(
                "unknown mode `{other}`, expected single, threads or processes"
            )),
        }
    }
}

/// Counts the words of all `paths` with the given strategy.
pub fn count_paths(mode: Mode, paths: &[PathBuf]) -> Result<WordCounts, CountsError> {
    log::debug!("counting {} file(s) in {mode:?} mode", paths.len());
    match mode {
        Mode::Single => Ok(count_sequential(paths)),
        Mode::Threads => Ok(count_threads(paths)),
        Mode::Processes => count_processes(paths),
    }
}

fn merge_or_report(total: &mut WordCounts, result: Result<WordCounts, CountsError>) {
    match result {
        Ok(counts) => total.merge(counts),
        Err(err) => eprintln!("wordcount: {err}"),
    }
}

pub fn count_sequential(paths: &[PathBuf]) -> WordCounts {
    let mut total = WordCounts::new();
    for path in paths {
        merge_or_report(&mut total, count_file(path));
    }
    total
}

/// All threads are joined before anything is merged.
pub fn count_threads(paths: &[PathBuf]) -> WordCounts {
    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = paths
            .iter()
            .map(|path| scope.spawn(move || count_file(path)))
            .collect();
        handles.into_iter().map(|handle| handle.join()).collect()
    });

    let mut total = WordCounts::new();
    for (path, result) in paths.iter().zip(results) {
        match result {
            Ok(result) => merge_or_report(&mut total, result),
            Err(_) => eprintln!("wordcount: {}: worker thread panicked", path.display()),
        }
    }
    total
}

struct Worker {
    pid: libc::pid_t,
    output: File,
}

/// Forks one child per file. Each child writes its counts to a pipe in the
/// `write_counts` format; the parent reads every pipe to EOF, merges, then
/// reaps the child.
///
/// Everything a child needs is prepared before the fork, and children report
/// failures with a plain `write(2)`, so no lock held by another thread of the
/// parent at fork time is ever taken in a child.
pub fn count_processes(paths: &[PathBuf]) -> Result<WordCounts, CountsError> {
    let pattern = word_pattern()?;
    let mut workers = Vec::with_capacity(paths.len());
    for path in paths {
        workers.push(fork_worker(path, &pattern)?);
    }

    let mut total = WordCounts::new();
    let mut failure = None;
    for Worker { pid, output } in workers {
        match WordCounts::read_counts(BufReader::new(output)) {
            Ok(counts) => total.merge(counts),
            Err(err) => {
                log::warn!("worker {pid} sent a bad counts stream: {err}");
                failure.get_or_insert(err);
            }
        }
        let status = wait_for(pid)?;
        log::debug!("worker {pid} exited with status {status}");
    }
    match failure {
        Some(err) => Err(err),
        None => Ok(total),
    }
}

fn fork_worker(path: &Path, pattern: &Regex) -> Result<Worker, CountsError> {
    let (read_end, write_end) = pipe()?;

    // SAFETY: the child only runs the counting code below and leaves through
    // `_exit`, never returning into the caller.
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        return Err(io::Error::last_os_error().into());
    }
    if pid == 0 {
        drop(read_end);
        let code = match run_worker(path, pattern, File::from(write_end)) {
            Ok(()) => 0,
            Err(err) => {
                write_stderr(format!("wordcount: {err}\n").as_bytes());
                1
            }
        };
        // SAFETY: terminates the child without running the parent's exit
        // handlers.
        unsafe { libc::_exit(code) }
    }

    drop(write_end);
    Ok(Worker {
        pid,
        output: File::from(read_end),
    })
}

fn run_worker(path: &Path, pattern: &Regex, output: File) -> Result<(), CountsError> {
    let counts = count_file_with(path, pattern)?;
    let mut out = BufWriter::new(output);
    counts.write_counts(&mut out)?;
    out.flush()?;
    Ok(())
}

/// Unbuffered, unlocked write to fd 2. Errors are ignored.
fn write_stderr(message: &[u8]) {
    // SAFETY: the pointer and length describe `message` for the whole call.
    unsafe {
        libc::write(libc::STDERR_FILENO, message.as_ptr().cast(), message.len());
    }
}

fn pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds: [libc::c_int; 2] = [0; 2];
    // SAFETY: `fds` has room for the two descriptors pipe(2) writes.
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: both descriptors were just opened and are owned by nobody else.
    Ok(unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) })
}

fn wait_for(pid: libc::pid_t) -> io::Result<libc::c_int> {
    let mut status = 0;
    loop {
        // SAFETY: `status` is a valid out-pointer for waitpid(2).
        if unsafe { libc::waitpid(pid, &mut status, 0) } >= 0 {
            return Ok(status);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}
