//! IOB to IOBES corpus converter
//!
//! Reads a tab-separated corpus tagged with IOB1 or IOB2 (BIO) labels and
//! writes the same sentences tagged with IOBES, one `token<TAB>tag` pair per
//! line and a blank line between sentences. Input that is already IOBES
//! passes through unchanged.

use anyhow::{Context, Result};
use clap::Parser;
use nerlaunch_core::corpus::read_corpus;
use nerlaunch_core::tags::count_invalid_transitions;
use nerlaunch_core::iob_to_iobes;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "iobes-convert")]
#[command(about = "Convert IOB/BIO-tagged TSV corpora to IOBES")]
#[command(version)]
struct Cli {
    /// Input corpus (stdin when omitted)
    input: Option<PathBuf>,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Convert every sentence and write it out, returning the sentence count
/// and the number of invalid transitions left after conversion.
fn convert<R: Read, W: Write>(input: R, origin: &Path, mut output: W) -> Result<(usize, usize)> {
    let sentences = read_corpus(input, origin)?;
    let mut invalid = 0;

    for (i, sentence) in sentences.iter().enumerate() {
        if i > 0 {
            writeln!(output)?;
        }
        let tags = iob_to_iobes(&sentence.tags);
        invalid += count_invalid_transitions(&tags);
        for (token, tag) in sentence.tokens.iter().zip(&tags) {
            writeln!(output, "{token}\t{tag}")?;
        }
    }

    output.flush()?;
    Ok((sentences.len(), invalid))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let cli = Cli::parse();

    let (input, origin): (Box<dyn Read>, PathBuf) = match &cli.input {
        Some(path) => (
            Box::new(
                File::open(path)
                    .with_context(|| format!("Failed to open {}", path.display()))?,
            ),
            path.clone(),
        ),
        None => (Box::new(io::stdin().lock()), PathBuf::from("<stdin>")),
    };

    let output: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let (sentences, invalid) = convert(input, &origin, output)?;
    info!(sentences, "converted {}", origin.display());
    if invalid > 0 {
        warn!(invalid, "output still contains invalid IOBES transitions");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(input: &str) -> (String, usize, usize) {
        let mut out = Vec::new();
        let (sentences, invalid) = convert(input.as_bytes(), Path::new("test.tsv"), &mut out).unwrap();
        (String::from_utf8(out).unwrap(), sentences, invalid)
    }

    #[test]
    fn test_converts_bio() {
        let input = "Naloxone\tB-Chemical\nreverses\tO\nblood\tB-Disease\npressure\tI-Disease\n\n\
                     Clonidine\tB-Chemical\n";
        let (out, sentences, invalid) = run(input);
        assert_eq!(sentences, 2);
        assert_eq!(invalid, 0);
        assert_eq!(
            out,
            "Naloxone\tS-Chemical\nreverses\tO\nblood\tB-Disease\npressure\tE-Disease\n\n\
             Clonidine\tS-Chemical\n"
        );
    }

    #[test]
    fn test_iobes_passes_through() {
        let input = "lithium\tB-Chemical\ncarbonate\tE-Chemical\ntoxicity\tS-Disease\n";
        let (out, _, _) = run(input);
        assert_eq!(out, input);
    }

    #[test]
    fn test_keeps_only_token_and_tag_columns() {
        let (out, _, _) = run("-DOCSTART-\tO\n\naspirin\tNN\tB-Chemical\n");
        assert_eq!(out, "aspirin\tS-Chemical\n");
    }

    #[test]
    fn test_reports_bad_lines() {
        let mut out = Vec::new();
        let err = convert("aspirin\tX-Chemical\n".as_bytes(), Path::new("bad.tsv"), &mut out)
            .unwrap_err();
        assert!(err.to_string().contains("bad.tsv:1"));
    }
}
