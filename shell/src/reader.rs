//! Reading whole commands from an input source.
//!
//! A [`LineSource`] hands out physical lines and shows the prompt it is asked
//! for; [`read_command`] drives the [`Tokenizer`] over as many lines as it
//! takes to close every quote.

use crate::command::Command;
use crate::env::Environment;
use crate::lexer::Tokenizer;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};

/// Prompt shown before the first line of a command.
pub const PRIMARY_PROMPT: &str = "cash$$$$ ";
/// Prompt shown while a command continues over several lines.
pub const CONTINUATION_PROMPT: &str = "........ ";

/// Which prompt a line is read under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Primary,
    Continuation,
}

impl Prompt {
    pub fn as_str(self) -> &'static str {
        match self {
            Prompt::Primary => PRIMARY_PROMPT,
            Prompt::Continuation => CONTINUATION_PROMPT,
        }
    }
}

/// Errors that abort reading a command.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("getline: {0}")]
    Io(#[from] io::Error),
    /// The user pressed the interrupt key at the line editor.
    #[error("interrupted")]
    Interrupted,
}

/// A source of physical input lines.
pub trait LineSource {
    /// Reads one line as raw bytes, including its newline if the source had
    /// one. Returns `Ok(None)` once the source is exhausted.
    fn read_line(&mut self, prompt: Prompt) -> Result<Option<Vec<u8>>, ReadError>;
}

/// Reads lines from any buffered stream, writing prompts to an optional sink.
pub struct StreamSource<R, W> {
    input: R,
    prompts: Option<W>,
}

impl<R: BufRead> StreamSource<R, io::Sink> {
    /// A source that never shows prompts (scripts and piped input).
    pub fn quiet(input: R) -> Self {
        Self {
            input,
            prompts: None,
        }
    }
}

impl<R: BufRead, W: Write> StreamSource<R, W> {
    pub fn new(input: R, prompts: Option<W>) -> Self {
        Self { input, prompts }
    }

    /// Gives back the prompt sink, mostly useful in tests.
    pub fn into_prompts(self) -> Option<W> {
        self.prompts
    }
}

impl<R: BufRead, W: Write> LineSource for StreamSource<R, W> {
    fn read_line(&mut self, prompt: Prompt) -> Result<Option<Vec<u8>>, ReadError> {
        if let Some(out) = self.prompts.as_mut() {
            out.write_all(prompt.as_str().as_bytes())?;
            out.flush()?;
        }

        let mut raw = Vec::new();
        let n = self.input.read_until(b'\n', &mut raw)?;
        if n == 0 {
            if let Some(out) = self.prompts.as_mut() {
                out.write_all(b"\n")?;
                out.flush()?;
            }
            return Ok(None);
        }
        Ok(Some(raw))
    }
}

/// Interactive line editor with history, used when stdin is a terminal.
pub struct EditorSource {
    editor: DefaultEditor,
}

impl EditorSource {
    pub fn new() -> rustyline::Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl LineSource for EditorSource {
    fn read_line(&mut self, prompt: Prompt) -> Result<Option<Vec<u8>>, ReadError> {
        match self.editor.readline(prompt.as_str()) {
            Ok(mut line) => {
                if !line.trim().is_empty() {
                    if let Err(err) = self.editor.add_history_entry(line.as_str()) {
                        log::debug!("history entry dropped: {err}");
                    }
                }
                line.push('\n');
                Ok(Some(line.into_bytes()))
            }
            Err(ReadlineError::Eof) => {
                println!();
                Ok(None)
            }
            Err(ReadlineError::Interrupted) => Err(ReadError::Interrupted),
            Err(ReadlineError::Io(err)) => Err(ReadError::Io(err)),
            Err(err) => Err(ReadError::Io(io::Error::other(err))),
        }
    }
}

/// Picks where a session reads its commands: the script when one is given,
/// the line editor (prompts, history) when the shell is interactive, plain
/// standard input otherwise.
pub fn session_source(script: Option<File>, env: &Environment) -> Box<dyn LineSource> {
    if let Some(file) = script {
        return Box::new(StreamSource::quiet(BufReader::new(file)));
    }
    if !env.interactive {
        return Box::new(StreamSource::quiet(io::stdin().lock()));
    }
    match EditorSource::new() {
        Ok(editor) => Box::new(editor),
        Err(err) => {
            log::warn!("line editor unavailable, falling back to plain input: {err}");
            Box::new(StreamSource::new(io::stdin().lock(), Some(io::stdout())))
        }
    }
}

/// Reads one full command, consuming continuation lines while a quote is
/// open or an escape is pending.
///
/// Returns `Ok(None)` at end of input. Input that ends inside an open quote
/// is discarded and also reported as end of input.
pub fn read_command(source: &mut dyn LineSource) -> Result<Option<Command>, ReadError> {
    let mut tokenizer = Tokenizer::new();
    let mut prompt = Prompt::Primary;

    loop {
        let Some(line) = source.read_line(prompt)? else {
            if prompt == Prompt::Continuation {
                log::warn!("end of input inside an unfinished command; discarding it");
            }
            return Ok(None);
        };

        tokenizer.feed_line(&line);
        if tokenizer.is_complete() {
            let command = Command::new(tokenizer.finish());
            log::debug!("read command: {:?}", command.tokens());
            return Ok(Some(command));
        }
        prompt = Prompt::Continuation;
    }
}
