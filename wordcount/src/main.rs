use anyhow::{Context, Result};
use argh::FromArgs;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use wordcount::{Mode, WordCounts, count_paths};

#[derive(FromArgs)]
/// Count word frequencies in files, or in standard input when none are given.
struct Args {
    #[argh(option, default = "Mode::Single")]
    /// how files are spread over workers: single, threads or processes.
    mode: Mode,

    #[argh(positional, greedy)]
    /// files to count.
    files: Vec<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args: Args = argh::from_env();

    let counts = if args.files.is_empty() {
        let mut counts = WordCounts::new();
        counts
            .count_words(io::stdin().lock())
            .context("reading standard input")?;
        counts
    } else {
        count_paths(args.mode, &args.files)?
    };

    let mut out = BufWriter::new(io::stdout().lock());
    counts.write_counts(&mut out)?;
    out.flush()?;
    Ok(())
}
