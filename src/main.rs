//! polka - Batch FB2 to EPUB converter

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use polka::Batch;

#[derive(Parser)]
#[command(name = "polka")]
#[command(version, about = "Batch FB2 to EPUB converter", long_about = None)]
#[command(after_help = "EXAMPLES:
    polka ~/Books                Convert into ~/Documents/Converted_Books/Books
    polka ~/Books /mnt/reader    Convert into /mnt/reader/Books")]
struct Cli {
    /// Source directory to scan for .fb2 and .epub files
    #[arg(value_name = "SOURCE_DIR")]
    source: PathBuf,

    /// Destination root (defaults to ~/Documents/Converted_Books)
    #[arg(value_name = "DEST_DIR")]
    dest: Option<PathBuf>,

    /// Suppress log output
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if !cli.quiet {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "polka=info".into()),
            )
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let batch = match Batch::new(&cli.source, cli.dest) {
        Ok(batch) => batch,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match batch.run() {
        Ok(summary) if summary.failed == 0 => ExitCode::SUCCESS,
        Ok(summary) => {
            eprintln!("error: {} file(s) failed to convert", summary.failed);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
