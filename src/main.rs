//! pagefix - remove stray page numbers from EPUB books

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pagefix::{GapMatch, Options, Session, SessionOptions, fix_epub, pages};

#[derive(Parser)]
#[command(name = "pagefix")]
#[command(version, about = "Remove stray page numbers from EPUB books", long_about = None)]
#[command(after_help = "EXAMPLES:
    pagefix book.epub                  Write book_fixed.epub
    pagefix book.epub -o clean.epub    Choose the output file
    pagefix --print-text book.epub     Show paragraph text without changing anything")]
struct Cli {
    /// Input EPUB files
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// Output file (only with a single input; defaults to <name>_fixed.epub)
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// How skipped page numbers are matched inside running text
    #[arg(long = "match", value_enum, default_value_t = GapMatch::Token)]
    match_mode: GapMatch,

    /// Print paragraph text in reading order instead of fixing
    #[arg(long)]
    print_text: bool,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Directory to unpack books into (defaults to the system temp dir)
    #[arg(long, value_name = "DIR")]
    workdir: Option<PathBuf>,

    /// Keep the unpacked book after the run
    #[arg(long)]
    keep_workdir: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if cli.output.is_some() && cli.inputs.len() > 1 {
        eprintln!("error: --output can only be used with a single input");
        return ExitCode::FAILURE;
    }

    let session_options = SessionOptions {
        work_root: cli.workdir.clone(),
        keep_workdir: cli.keep_workdir,
    };
    let options = Options {
        gap_match: cli.match_mode,
    };

    let mut failed = false;
    for input in &cli.inputs {
        let result = if cli.print_text {
            print_text(input, &session_options)
        } else {
            fix(input, cli.output.as_deref(), &options, &session_options, cli.json)
        };
        if let Err(e) = result {
            eprintln!("error: {}: {e:#}", input.display());
            failed = true;
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn fix(
    input: &Path,
    output: Option<&Path>,
    options: &Options,
    session_options: &SessionOptions,
    json: bool,
) -> anyhow::Result<()> {
    if !input.is_file() {
        bail!("no such file");
    }
    info!(input = %input.display(), "fixing page numbers");
    let report = fix_epub(input, output, options, session_options)?;

    if json {
        let out = serde_json::to_string_pretty(&report).context("serializing report")?;
        println!("{out}");
    } else {
        info!(
            removed = report.page_numbers_removed,
            erased = report.gap_numbers_erased,
            skipped = report.paragraphs_skipped,
            "done"
        );
    }
    Ok(())
}

fn print_text(input: &Path, session_options: &SessionOptions) -> anyhow::Result<()> {
    let session = Session::open(input, session_options)?;
    let store = session.store();
    for (path, texts) in pages::paragraph_texts(&store)? {
        println!("== {path}");
        for text in texts {
            println!("{text}");
        }
    }
    Ok(())
}
