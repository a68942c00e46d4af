use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use std::path::PathBuf;
use tempo_detect::git::{self, GitCli};
use tempo_detect::{DetectConfig, Detector, StoreBackend};
use tracing_subscriber::EnvFilter;

/// Attribute the last commit to AI coding tools.
#[derive(Debug, Parser)]
#[command(name = "tempo-detect", version)]
struct Cli {
    /// Any directory inside the repository (defaults to the current one)
    repo: Option<PathBuf>,

    /// Ignore sessions older than this many hours (overrides TEMPO_SESSION_MAX_AGE)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_age_hours: Option<u32>,

    /// Query Cursor stores through the sqlite3 executable
    #[arg(long)]
    sqlite_cli: bool,

    /// Log pipeline decisions to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let start = match cli.repo {
        Some(dir) => dir,
        None => std::env::current_dir().wrap_err("reading current directory")?,
    };
    let repo_root = git::repo_root(&GitCli, &start)
        .wrap_err_with(|| format!("{} is not inside a git repository", start.display()))?;

    let mut config = DetectConfig::from_env();
    if let Some(hours) = cli.max_age_hours {
        config = config.with_max_age_hours(hours);
    }
    let backend = if cli.sqlite_cli {
        StoreBackend::Sqlite3Cli
    } else {
        StoreBackend::Embedded
    };

    let detector = Detector::from_environment(backend, config);
    match detector.detect(&repo_root)? {
        Some(attribution) => println!("{}", serde_json::to_string_pretty(&attribution)?),
        None => println!("No AI tool usage detected in the last commit."),
    }
    Ok(())
}
