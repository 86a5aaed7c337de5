mod compact;
mod config;
mod daemon;
mod datepath;
mod disk;
mod select;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

/// A housekeeping daemon that keeps a hot storage tree from filling up:
/// compacts the oldest files whenever free space runs low, and archives
/// aged media files on a daily sweep. Compacted files become per-file zip
/// containers under the archive root, mirroring the year/month/day layout.
#[derive(Parser, Debug)]
#[command(name = "icebox", version, about)]
pub struct Cli {
    /// Hot storage tree to watch (year/month/day/file layout)
    #[arg(value_name = "STORAGE_ROOT")]
    storage: PathBuf,

    /// Where archive containers are written (created on demand)
    #[arg(value_name = "ARCHIVE_ROOT")]
    archive: PathBuf,

    /// Config file path
    #[arg(short, long, default_value = "icebox.toml")]
    config: PathBuf,

    /// Validate config and print resolved settings, don't run
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    let config = match config::Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(config = %cli.config.display(), error = %e, "cannot load configuration");
            return ExitCode::FAILURE;
        }
    };

    if cli.check {
        println!("icebox v{}", env!("CARGO_PKG_VERSION"));
        println!("Config file:   {}", cli.config.display());
        println!("Storage root:  {}", cli.storage.display());
        println!("Archive root:  {}", cli.archive.display());
        println!(
            "Space policy:  compact below {:.1}% free, poll every {}s, oldest by {}",
            config.pressure.free_ratio * 100.0,
            config.pressure.poll_interval_secs,
            config.pressure.order,
        );
        println!(
            "Retention:     [{}] after {} days, sweep every {}s",
            config.retention.extensions.join(", "),
            config.retention.threshold_days,
            config.retention.sweep_interval_secs,
        );
        println!("On collision:  {}", config.archive.on_collision);
        return ExitCode::SUCCESS;
    }

    // The archive root is created as containers land; the storage root has
    // to exist up front or both policies would silently watch nothing.
    if !cli.storage.is_dir() {
        tracing::error!(storage = %cli.storage.display(), "storage root is not a directory");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        storage = %cli.storage.display(),
        archive = %cli.archive.display(),
        "icebox starting"
    );

    daemon::run(config, cli.storage, cli.archive).await;
    ExitCode::SUCCESS
}
