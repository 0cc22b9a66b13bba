use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use anyhow::{Context, Result, anyhow};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "pwd" or "cd".
    fn name() -> &'static str;

    /// One-line summary shown by `help`.
    fn summary() -> &'static str;

    /// Executes the command using the provided output stream and environment.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        <T as BuiltinCommand>::execute(*self, stdout, env)
    }
}

/// Output of argh when it refuses the arguments or answers `--help`.
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        if self.is_error {
            writeln!(stderr, "{}", self.output.trim_end())?;
            Ok(1)
        } else {
            writeln!(stdout, "{}", self.output.trim_end())?;
            Ok(0)
        }
    }
}

/// Factory allows creating instances of a builtin by name.
///
/// Built-ins take no options: every word after the name is handed to argh
/// as a positional, even one that starts with `-`.
pub(crate) struct Factory<T> {
    _phantom: PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
        if name != T::name() {
            return None;
        }
        let mut positional = Vec::with_capacity(args.len() + 1);
        positional.push("--");
        positional.extend_from_slice(args);
        Some(match T::from_args(&[name], &positional) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                output,
                is_error: status.is_err(),
            }),
        })
    }
}

/// The built-ins every shell starts with.
pub(crate) fn default_builtins() -> Vec<Box<dyn CommandFactory>> {
    vec![
        Box::new(Factory::<Help>::default()),
        Box::new(Factory::<Exit>::default()),
        Box::new(Factory::<Cd>::default()),
        Box::new(Factory::<Pwd>::default()),
    ]
}

/// Writes the shell banner, invocation syntax and the list of built-ins.
pub fn write_usage(out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        out,
        "\u{1F309} \u{1F30A} \u{2600}\u{FE0F} cash: The California Shell \u{1F334} \u{1F43B} \u{1F3D4}\u{FE0F}"
    )?;
    writeln!(out, "Usage: cash [script.sh]")?;
    writeln!(out)?;
    writeln!(out, "Built-in commands:")?;
    for (name, summary) in [
        (Help::name(), Help::summary()),
        (Exit::name(), Exit::summary()),
        (Cd::name(), Cd::summary()),
        (Pwd::name(), Pwd::summary()),
    ] {
        writeln!(out, "{name}: {summary}")?;
    }
    writeln!(out)
}

#[derive(FromArgs)]
/// Print out usage information.
pub struct Help {
    #[argh(positional, greedy)]
    /// ignored.
    pub words: Vec<String>,
}

impl BuiltinCommand for Help {
    fn name() -> &'static str {
        "help"
    }

    fn summary() -> &'static str {
        "Print out this usage information."
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        write_usage(stdout)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Exit the shell with the given status (0 when omitted or not a number).
pub struct Exit {
    #[argh(positional, greedy)]
    /// exit status; leading digits are used, anything else counts as 0.
    /// Words after the first are ignored.
    pub code: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn summary() -> &'static str {
        "Exit the shell with status N (default 0)."
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let code = self.code.first().map_or(0, |text| parse_exit_code(text));
        env.exit_code = Some(code);
        Ok(code)
    }
}

/// Parses an exit status the way C's `atoi` does: optional leading
/// whitespace and sign, then as many digits as there are. No digits means 0.
pub fn parse_exit_code(text: &str) -> ExitCode {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i32, |acc, d| acc.wrapping_mul(10).wrapping_add(i32::from(d - b'0')));
    if negative { value.wrapping_neg() } else { value }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional, greedy)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    /// Words after the first are ignored.
    pub target: Vec<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn summary() -> &'static str {
        "Change the working directory to DIR (default $HOME)."
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let target = match self.target.into_iter().next() {
            Some(t) if !t.is_empty() => t,
            _ => env
                .get_var("HOME")
                .ok_or_else(|| anyhow!("cd: HOME not set"))?,
        };

        let path = PathBuf::from(&target);
        let new_dir = if path.is_absolute() {
            path
        } else {
            env.current_dir.join(path)
        };

        let canonical = fs::canonicalize(&new_dir).with_context(|| format!("cd: {target}"))?;
        env::set_current_dir(&canonical).with_context(|| format!("cd: {target}"))?;
        log::debug!("working directory is now {}", canonical.display());
        env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {
    #[argh(positional, greedy)]
    /// ignored.
    pub words: Vec<String>,
}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn summary() -> &'static str {
        "Print the current working directory."
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        let cwd = env::current_dir().context("pwd")?;
        writeln!(stdout, "{}", cwd.display())?;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::lock_current_dir;
    use std::collections::HashMap;
    use std::env as stdenv;

    fn empty_env() -> Environment {
        Environment {
            vars: HashMap::new(),
            current_dir: stdenv::current_dir().unwrap(),
            interactive: false,
            exit_code: None,
        }
    }

    fn run(name: &str, args: &[&str], env: &mut Environment) -> (Result<ExitCode>, String, String) {
        let factories = default_builtins();
        let cmd = factories
            .iter()
            .find_map(|f| f.try_create(name, args))
            .expect("builtin exists");
        let mut out = Vec::new();
        let mut err = Vec::new();
        let res = cmd.execute(&mut out, &mut err, env);
        (
            res,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn test_unknown_name_is_not_builtin() {
        let factories = default_builtins();
        assert!(factories.iter().all(|f| f.try_create("ls", &[]).is_none()));
    }

    #[test]
    fn test_pwd_prints_current_dir() {
        let _lock = lock_current_dir();
        let cur = stdenv::current_dir().unwrap();
        let mut env = empty_env();

        let (res, out, _) = run("pwd", &[], &mut env);
        assert_eq!(res.unwrap(), 0);
        assert_eq!(out, format!("{}\n", cur.display()));
    }

    #[test]
    fn test_help_lists_builtins() {
        let mut env = empty_env();
        let (res, out, _) = run("help", &[], &mut env);
        assert_eq!(res.unwrap(), 0);
        assert!(out.contains("Usage: cash [script.sh]"));
        for name in ["help", "exit", "cd", "pwd"] {
            assert!(out.contains(&format!("{name}: ")), "missing {name}");
        }
    }

    #[test]
    fn test_exit_codes() {
        for (args, expected) in [
            (&[][..], 0),
            (&["7"][..], 7),
            (&["abc"][..], 0),
            (&["12abc"][..], 12),
            (&["-3"][..], -3),
            (&["3", "4"][..], 3),
        ] {
            let mut env = empty_env();
            let (res, _, _) = run("exit", args, &mut env);
            assert_eq!(res.unwrap(), expected, "args {args:?}");
            assert_eq!(env.exit_code, Some(expected));
        }
    }

    #[test]
    fn test_parse_exit_code_is_permissive() {
        assert_eq!(parse_exit_code("  42"), 42);
        assert_eq!(parse_exit_code("+5"), 5);
        assert_eq!(parse_exit_code(""), 0);
        assert_eq!(parse_exit_code("x1"), 0);
    }

    #[test]
    fn test_help_ignores_extra_words() {
        let mut env = empty_env();
        let (res, out, err) = run("help", &["me", "--please"], &mut env);
        assert_eq!(res.unwrap(), 0);
        assert!(out.contains("Usage: cash [script.sh]"));
        assert!(err.is_empty());
    }

    #[test]
    fn test_pwd_ignores_extra_words() {
        let _lock = lock_current_dir();
        let cur = stdenv::current_dir().unwrap();
        let mut env = empty_env();

        let (res, out, err) = run("pwd", &["now", "-L"], &mut env);
        assert_eq!(res.unwrap(), 0);
        assert_eq!(out, format!("{}\n", cur.display()));
        assert!(err.is_empty());
    }

    #[test]
    fn test_cd_dash_word_is_a_directory() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir(temp.path().join("-dir")).unwrap();
        let mut env = empty_env();
        env.current_dir = fs::canonicalize(temp.path()).unwrap();

        let (res, _, _) = run("cd", &["-dir", "ignored"], &mut env);
        let new_cwd = stdenv::current_dir().unwrap();
        stdenv::set_current_dir(&orig).expect("failed to restore cwd");

        assert_eq!(res.unwrap(), 0);
        assert_eq!(new_cwd, fs::canonicalize(temp.path().join("-dir")).unwrap());
    }

    #[derive(FromArgs)]
    /// Needs exactly one word.
    struct Needy {
        #[argh(positional)]
        /// the word.
        word: String,
    }

    impl BuiltinCommand for Needy {
        fn name() -> &'static str {
            "needy"
        }

        fn summary() -> &'static str {
            "Test helper."
        }

        fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
            writeln!(stdout, "{}", self.word)?;
            Ok(0)
        }
    }

    #[test]
    fn test_rejected_arguments_report_on_stderr() {
        let factory = Factory::<Needy>::default();
        let cmd = factory.try_create("needy", &[]).expect("name matches");
        let mut out = Vec::new();
        let mut err = Vec::new();
        let res = cmd.execute(&mut out, &mut err, &mut empty_env());

        assert_eq!(res.unwrap(), 1);
        assert!(out.is_empty());
        assert!(!err.is_empty());
    }

    #[test]
    fn test_cd_to_absolute_path() {
        let _lock = lock_current_dir();
        let temp = tempfile::tempdir().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();
        let orig = stdenv::current_dir().unwrap();
        let mut env = empty_env();

        let target = canonical_temp.to_string_lossy().to_string();
        let (res, _, _) = run("cd", &[target.as_str()], &mut env);
        let new_cwd = stdenv::current_dir().unwrap();
        stdenv::set_current_dir(&orig).expect("failed to restore cwd");

        assert_eq!(res.unwrap(), 0);
        assert_eq!(fs::canonicalize(new_cwd).unwrap(), canonical_temp);
        assert_eq!(env.current_dir, canonical_temp);
    }

    #[test]
    fn test_cd_relative_path() {
        let _lock = lock_current_dir();
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        let orig = stdenv::current_dir().unwrap();
        let mut env = empty_env();
        env.current_dir = fs::canonicalize(temp.path()).unwrap();

        let (res, _, _) = run("cd", &["sub"], &mut env);
        let new_cwd = stdenv::current_dir().unwrap();
        stdenv::set_current_dir(&orig).expect("failed to restore cwd");

        assert_eq!(res.unwrap(), 0);
        assert_eq!(new_cwd, fs::canonicalize(temp.path().join("sub")).unwrap());
    }

    #[test]
    fn test_cd_to_home_when_none() {
        let _lock = lock_current_dir();
        let temp = tempfile::tempdir().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();
        let orig = stdenv::current_dir().unwrap();
        let mut env = empty_env();
        env.set_var("HOME", canonical_temp.to_string_lossy().to_string());

        let (res, _, _) = run("cd", &[], &mut env);
        let new_cwd = stdenv::current_dir().unwrap();
        stdenv::set_current_dir(&orig).expect("failed to restore cwd");

        assert_eq!(res.unwrap(), 0);
        assert_eq!(fs::canonicalize(new_cwd).unwrap(), canonical_temp);
        assert_eq!(env.current_dir, canonical_temp);
    }

    #[test]
    fn test_cd_nonexistent_path_errors() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();
        let mut env = empty_env();

        let name = format!("/nonexistent_dir_for_cash_test_{}", std::process::id());
        let (res, _, _) = run("cd", &[name.as_str()], &mut env);

        let err = res.unwrap_err();
        assert!(format!("{err:#}").starts_with(&format!("cd: {name}: ")));
        assert_eq!(stdenv::current_dir().unwrap(), orig);
        assert_eq!(env.current_dir, orig);
    }
}
