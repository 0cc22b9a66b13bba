//! Lexical analysis of shell input: splits physical lines into dequoted tokens.
//!
//! The tokenizer is fed one physical line at a time and keeps its quote mode,
//! escape flag and partial token between lines, so a quote left open at the end
//! of a line swallows the newline and continues on the next one.
//!
//! Input is scanned as bytes. Every special character is ASCII, so UTF-8 text
//! passes through unchanged and bytes that are not UTF-8 reach programs as typed.

use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;

/// Quoting context the tokenizer is currently in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QuoteMode {
    /// Outside any quotes; whitespace separates tokens.
    #[default]
    Normal,
    /// Inside `'...'`.
    Single,
    /// Inside `"..."`.
    Double,
}

/// Errors reported by [`split_into_tokens`] when the text ends mid-token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexingError {
    /// A closing quote (single or double) was not found.
    #[error("unterminated {0} quote")]
    UnfinishedQuote(char),
    /// The text ended right after a backslash.
    #[error("dangling escape at end of input")]
    DanglingEscape,
}

/// Incremental tokenizer state for a single command, possibly spanning lines.
#[derive(Debug, Default)]
pub struct Tokenizer {
    quote: QuoteMode,
    escape_pending: bool,
    buffer: Vec<u8>,
    tokens: Vec<OsString>,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans one physical line. A missing trailing newline is synthesized so
    /// the last token on the line is always finalized.
    pub fn feed_line(&mut self, line: &[u8]) {
        self.escape_pending = false;
        for &byte in line {
            self.handle(byte);
        }
        if line.last() != Some(&b'\n') {
            self.handle(b'\n');
        }
    }

    /// True once no quote is open and no escape is pending.
    pub fn is_complete(&self) -> bool {
        self.quote == QuoteMode::Normal && !self.escape_pending
    }

    pub fn quote_mode(&self) -> QuoteMode {
        self.quote
    }

    pub fn escape_pending(&self) -> bool {
        self.escape_pending
    }

    /// Consumes the tokenizer and returns the tokens collected so far.
    pub fn finish(mut self) -> Vec<OsString> {
        self.finalize_token();
        self.tokens
    }

    fn handle(&mut self, byte: u8) {
        match self.quote {
            QuoteMode::Normal => self.handle_normal(byte),
            QuoteMode::Single => self.handle_quoted(byte, b'\''),
            QuoteMode::Double => self.handle_quoted(byte, b'"'),
        }
    }

    fn handle_normal(&mut self, byte: u8) {
        match byte {
            b if is_separator(b) => self.finalize_token(),
            b'\\' => {
                if self.escape_pending {
                    self.buffer.push(b'\\');
                    self.escape_pending = false;
                } else {
                    self.escape_pending = true;
                }
            }
            b'\'' | b'"' if self.escape_pending => {
                self.buffer.push(byte);
                self.escape_pending = false;
            }
            b'\'' => self.quote = QuoteMode::Single,
            b'"' => self.quote = QuoteMode::Double,
            b => {
                self.buffer.push(b);
                self.escape_pending = false;
            }
        }
    }

    fn handle_quoted(&mut self, byte: u8, closing: u8) {
        match byte {
            b if b == closing => self.quote = QuoteMode::Normal,
            // Backslashes carry no meaning inside quotes and are dropped.
            b'\\' => {}
            b => self.buffer.push(b),
        }
    }

    fn finalize_token(&mut self) {
        if !self.buffer.is_empty() {
            self.tokens
                .push(OsString::from_vec(std::mem::take(&mut self.buffer)));
        }
    }
}

/// Bytes that end a token outside quotes (the C locale `isspace` set).
fn is_separator(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r')
}

/// Tokenizes a complete piece of text in one call.
///
/// The text is fed line by line exactly as the interactive reader would,
/// but an unterminated quote or a trailing escape is reported as an error
/// instead of asking for more input.
pub fn split_into_tokens(text: impl AsRef<[u8]>) -> Result<Vec<OsString>, LexingError> {
    let mut tokenizer = Tokenizer::new();
    for line in text.as_ref().split_inclusive(|&b| b == b'\n') {
        tokenizer.feed_line(line);
    }
    match tokenizer.quote_mode() {
        QuoteMode::Single => return Err(LexingError::UnfinishedQuote('\'')),
        QuoteMode::Double => return Err(LexingError::UnfinishedQuote('"')),
        QuoteMode::Normal => {}
    }
    if tokenizer.escape_pending() {
        return Err(LexingError::DanglingEscape);
    }
    Ok(tokenizer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn strings(tokens: Vec<OsString>) -> Vec<String> {
        tokens
            .into_iter()
            .map(|t| t.into_string().unwrap())
            .collect()
    }

    fn toks(s: &str) -> Vec<String> {
        strings(split_into_tokens(s).unwrap())
    }

    #[test]
    fn splits_on_whitespace_runs() {
        assert_eq!(toks("  ls   -l\t/tmp  \n"), vec!["ls", "-l", "/tmp"]);
    }

    #[test]
    fn empty_and_blank_lines_have_no_tokens() {
        assert!(toks("").is_empty());
        assert!(toks("   \t \n").is_empty());
    }

    #[test]
    fn single_quotes_keep_whitespace() {
        assert_eq!(toks("'a b'"), vec!["a b"]);
        assert_eq!(toks("echo 'hello   world' x"), vec!["echo", "hello   world", "x"]);
    }

    #[test]
    fn double_quotes_behave_like_single_quotes() {
        assert_eq!(toks("echo \"a b\" '$HOME'"), vec!["echo", "a b", "$HOME"]);
        assert_eq!(toks("\"it's\""), vec!["it's"]);
    }

    #[test]
    fn quotes_join_with_adjacent_text() {
        assert_eq!(toks("a'b c'd"), vec!["ab cd"]);
    }

    #[test]
    fn empty_quotes_produce_no_token() {
        assert_eq!(toks("echo '' \"\""), vec!["echo"]);
    }

    #[test]
    fn escaped_quote_is_literal() {
        assert_eq!(toks(r"it\'s"), vec!["it's"]);
        assert_eq!(toks(r#"say \"hi\""#), vec!["say", "\"hi\""]);
    }

    #[test]
    fn double_backslash_is_literal_backslash() {
        assert_eq!(toks(r"a\\b"), vec![r"a\b"]);
    }

    #[test]
    fn backslash_before_plain_char_is_dropped() {
        assert_eq!(toks(r"\a\b"), vec!["ab"]);
    }

    #[test]
    fn backslash_inside_quotes_is_dropped() {
        assert_eq!(toks(r"'a\b'"), vec!["ab"]);
        // the backslash does not protect the quote, which closes the region
        assert_eq!(toks(r#""a\"b"#), vec!["ab"]);
    }

    #[test]
    fn escaped_space_still_separates() {
        assert_eq!(toks(r"a\ b"), vec!["a", "b"]);
    }

    #[test]
    fn newline_inside_quote_is_content() {
        assert_eq!(toks("echo 'one\ntwo'\n"), vec!["echo", "one\ntwo"]);
    }

    #[test]
    fn tokenizer_waits_for_closing_quote() {
        let mut t = Tokenizer::new();
        t.feed_line(b"echo \"first\n");
        assert!(!t.is_complete());
        assert_eq!(t.quote_mode(), QuoteMode::Double);
        t.feed_line(b"second\" done\n");
        assert!(t.is_complete());
        assert_eq!(strings(t.finish()), vec!["echo", "first\nsecond", "done"]);
    }

    #[test]
    fn trailing_backslash_continues_line() {
        let mut t = Tokenizer::new();
        t.feed_line(b"echo a\\\n");
        assert!(!t.is_complete());
        t.feed_line(b"b\n");
        assert!(t.is_complete());
        assert_eq!(strings(t.finish()), vec!["echo", "a", "b"]);
    }

    #[test]
    fn missing_newline_is_synthesized() {
        let mut t = Tokenizer::new();
        t.feed_line(b"ls -a");
        assert!(t.is_complete());
        assert_eq!(strings(t.finish()), vec!["ls", "-a"]);
    }

    #[test]
    fn non_utf8_bytes_are_kept() {
        let tokens = split_into_tokens(b"printf '\xff x' \xfe\xff\n").unwrap();
        let bytes: Vec<Vec<u8>> = tokens.into_iter().map(OsString::into_vec).collect();
        assert_eq!(bytes, vec![b"printf".to_vec(), b"\xff x".to_vec(), b"\xfe\xff".to_vec()]);
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert_eq!(split_into_tokens("echo 'abc"), Err(LexingError::UnfinishedQuote('\'')));
        assert_eq!(split_into_tokens("echo \"abc"), Err(LexingError::UnfinishedQuote('"')));
    }

    #[test]
    fn dangling_escape_is_an_error() {
        assert_eq!(split_into_tokens("echo \\"), Err(LexingError::DanglingEscape));
    }

    proptest! {
        #[test]
        fn plain_text_splits_like_split_whitespace(words in proptest::collection::vec("[a-zA-Z0-9_./-]{1,8}", 0..10), seps in proptest::collection::vec("[ \t]{1,3}", 0..11)) {
            let mut line = String::new();
            for (i, w) in words.iter().enumerate() {
                line.push_str(seps.get(i).map(String::as_str).unwrap_or(" "));
                line.push_str(w);
            }
            line.push_str(seps.last().map(String::as_str).unwrap_or(""));
            let expected: Vec<String> = line.split_whitespace().map(str::to_owned).collect();
            prop_assert_eq!(strings(split_into_tokens(&line).unwrap()), expected);
        }

        #[test]
        fn single_quoted_text_is_one_token(body in "[a-z ]{0,20}") {
            let tokens = strings(split_into_tokens(format!("'{body}'")).unwrap());
            if body.is_empty() {
                prop_assert!(tokens.is_empty());
            } else {
                prop_assert_eq!(tokens, vec![body]);
            }
        }
    }
}
