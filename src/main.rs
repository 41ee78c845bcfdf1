//! Command-line entry point.

use std::io::{self, BufWriter};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use cvscvt::{walk, Converter, Options, OutputFormat};

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum FormatArg {
    #[default]
    Git,
    Svn,
}

impl From<FormatArg> for OutputFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Git => Self::Git,
            FormatArg::Svn => Self::Svn,
        }
    }
}

/// Convert RCS/CVS repositories to git fast-import or svn dump streams.
#[derive(Debug, Parser)]
#[command(name = "cvscvt", version, about)]
struct Cli {
    /// Output format.
    #[arg(short = 'f', long, value_enum, default_value = "git")]
    format: FormatArg,

    /// Trunk ref name (git) or trunk directory (svn).
    #[arg(short = 'T', long)]
    trunk: Option<String>,

    /// Tags directory name (svn only).
    #[arg(short = 't', long)]
    tags: Option<String>,

    /// Committer email domain (git only).
    #[arg(short = 'e', long)]
    email_domain: Option<String>,

    /// Changeset split threshold; seconds, or a number with an
    /// `s`/`m`/`h`/`d` suffix.
    #[arg(short = 's', long = "split")]
    split_threshold: Option<String>,

    /// Additional keyword to unexpand (repeatable).
    #[arg(short = 'k', long = "keyword")]
    keywords: Vec<String>,

    /// Do not unexpand the default RCS keyword set.
    #[arg(short = 'K', long)]
    no_default_keywords: bool,

    /// Report progress per file.
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Directories (or single `,v` files) to convert.
    #[arg(required = true)]
    roots: Vec<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), cvscvt::Error> {
    let opts = Options::resolve(
        cli.format.into(),
        cli.trunk.as_deref(),
        cli.tags.as_deref(),
        cli.email_domain.as_deref(),
        cli.split_threshold.as_deref(),
        cli.no_default_keywords,
        &cli.keywords,
        cli.verbose,
    )?;

    let sink = BufWriter::new(io::stdout().lock());
    let mut cv = Converter::new(opts, sink);
    walk::walk_roots(&mut cv, &cli.roots)?;
    cv.finish()?;
    Ok(())
}

/// Warnings and progress go to stderr; the stream owns stdout.
fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
