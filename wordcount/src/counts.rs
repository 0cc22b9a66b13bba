use regex::bytes::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Words shorter than this are not counted.
pub const MIN_WORD_LEN: usize = 2;

const WORD_PATTERN: &str = r"(?-u)[A-Za-z]+";

/// Compiles the matcher for maximal runs of ASCII letters.
pub fn word_pattern() -> Result<Regex, CountsError> {
    Ok(Regex::new(WORD_PATTERN)?)
}

#[derive(Debug, thiserror::Error)]
pub enum CountsError {
    #[error("{}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("invalid word pattern: {0}")]
    Pattern(#[from] regex::Error),
    /// A line of a counts stream is not `<count>\t<word>`.
    #[error("ill-formed count on line {line}: {text:?}")]
    Malformed { line: usize, text: String },
}

/// One `(word, count)` pair borrowed from a [`WordCounts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry<'a> {
    pub word: &'a str,
    pub count: u64,
}

/// Orders entries by count, then alphabetically.
pub fn by_count(a: &Entry<'_>, b: &Entry<'_>) -> Ordering {
    a.count.cmp(&b.count).then_with(|| a.word.cmp(b.word))
}

/// Mapping from word to the number of times it was seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordCounts {
    counts: HashMap<String, u64>,
}

impl WordCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn get(&self, word: &str) -> Option<u64> {
        self.counts.get(word).copied()
    }

    pub fn add_word(&mut self, word: impl Into<String>) {
        self.add_word_with_count(word, 1);
    }

    pub fn add_word_with_count(&mut self, word: impl Into<String>, count: u64) {
        *self.counts.entry(word.into()).or_insert(0) += count;
    }

    /// Adds every count of `other` into `self`.
    pub fn merge(&mut self, other: WordCounts) {
        for (word, count) in other.counts {
            self.add_word_with_count(word, count);
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = Entry<'_>> {
        self.counts.iter().map(|(word, &count)| Entry {
            word: word.as_str(),
            count,
        })
    }

    pub fn sorted_by<F>(&self, mut compare: F) -> Vec<Entry<'_>>
    where
        F: FnMut(&Entry<'_>, &Entry<'_>) -> Ordering,
    {
        let mut entries: Vec<_> = self.entries().collect();
        entries.sort_by(|a, b| compare(a, b));
        entries
    }

    /// Counts the words of `reader`: maximal runs of ASCII letters,
    /// lowercased, at least [`MIN_WORD_LEN`] long.
    pub fn count_words(&mut self, reader: impl BufRead) -> Result<(), CountsError> {
        self.count_words_with(reader, &word_pattern()?)
    }

    /// [`count_words`](Self::count_words) with an already compiled [`word_pattern`].
    pub fn count_words_with(
        &mut self,
        mut reader: impl BufRead,
        pattern: &Regex,
    ) -> Result<(), CountsError> {
        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                return Ok(());
            }
            for word in pattern.find_iter(&line) {
                let word = word.as_bytes();
                if word.len() >= MIN_WORD_LEN {
                    self.add_word(String::from_utf8_lossy(word).to_ascii_lowercase());
                }
            }
        }
    }

    /// Writes one `"{count:>8}\t{word}"` line per word, ordered by [`by_count`].
    pub fn write_counts(&self, out: &mut impl Write) -> io::Result<()> {
        for Entry { word, count } in self.sorted_by(by_count) {
            writeln!(out, "{count:>8}\t{word}")?;
        }
        Ok(())
    }

    /// Parses a stream produced by [`write_counts`](Self::write_counts).
    /// Repeated words are summed.
    pub fn read_counts(reader: impl BufRead) -> Result<WordCounts, CountsError> {
        let mut counts = WordCounts::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let malformed = || CountsError::Malformed {
                line: idx + 1,
                text: line.clone(),
            };
            let (count, word) = line.split_once('\t').ok_or_else(malformed)?;
            let count: u64 = count.trim_start().parse().map_err(|_| malformed())?;
            if word.is_empty() || word.contains(char::is_whitespace) {
                return Err(malformed());
            }
            counts.add_word_with_count(word, count);
        }
        Ok(counts)
    }
}

/// Counts the words of one file.
pub fn count_file(path: &Path) -> Result<WordCounts, CountsError> {
    count_file_with(path, &word_pattern()?)
}

pub fn count_file_with(path: &Path, pattern: &Regex) -> Result<WordCounts, CountsError> {
    let file = File::open(path).map_err(|source| CountsError::Open {
        path: path.to_owned(),
        source,
    })?;
    let mut counts = WordCounts::new();
    counts.count_words_with(BufReader::new(file), pattern)?;
    Ok(counts)
}
