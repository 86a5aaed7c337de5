//! The long-running daemon: two concurrent housekeeping loops.
//!
//! The space loop polls the storage filesystem and, while it is under
//! pressure, compacts the oldest file one at a time so it stops as soon as
//! enough space is back. The sweep loop archives aged media files on a daily
//! cadence, once immediately at startup. Each loop does one pass, sleeps,
//! and repeats; a pass always runs to completion, so shutdown never lands in
//! the middle of a compaction.

use crate::compact::{self, CompactOutcome};
use crate::config::{CollisionPolicy, Config, PressureConfig, RetentionConfig};
use crate::disk;
use crate::select;
use chrono::{Local, NaiveDate};
use std::io;
use std::path::{Path, PathBuf};

/// Run both loops until a shutdown signal arrives.
pub async fn run(config: Config, storage_root: PathBuf, archive_root: PathBuf) {
    let Config {
        pressure,
        retention,
        archive,
    } = config;

    tracing::info!(
        free_ratio = pressure.free_ratio,
        poll_interval_secs = pressure.poll_interval_secs,
        "space reclaimer active"
    );
    tracing::info!(
        threshold_days = retention.threshold_days,
        sweep_interval_secs = retention.sweep_interval_secs,
        "retention sweep active"
    );

    let threshold = pressure.free_ratio;
    let mut space = tokio::spawn(space_loop(
        pressure,
        archive.on_collision,
        storage_root.clone(),
        archive_root.clone(),
        move |path: &Path| disk::is_under_pressure(path, threshold),
    ));
    let mut sweep = tokio::spawn(sweep_loop(
        retention,
        archive.on_collision,
        storage_root,
        archive_root,
        || Local::now().date_naive(),
    ));

    tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, stopping");
        }
        _ = &mut space => {
            tracing::error!("space reclaim loop exited unexpectedly");
        }
        _ = &mut sweep => {
            tracing::error!("retention sweep loop exited unexpectedly");
        }
    }
    space.abort();
    sweep.abort();
}

async fn space_loop<P>(
    config: PressureConfig,
    on_collision: CollisionPolicy,
    storage_root: PathBuf,
    archive_root: PathBuf,
    probe: P,
) where
    P: Fn(&Path) -> io::Result<bool>,
{
    let interval = config.poll_interval();
    loop {
        reclaim_pass(&config, on_collision, &storage_root, &archive_root, &probe);
        tokio::time::sleep(interval).await;
    }
}

async fn sweep_loop<T>(
    config: RetentionConfig,
    on_collision: CollisionPolicy,
    storage_root: PathBuf,
    archive_root: PathBuf,
    today: T,
) where
    T: Fn() -> NaiveDate,
{
    let interval = config.sweep_interval();
    loop {
        sweep_pass(&config, on_collision, &storage_root, &archive_root, today());
        tokio::time::sleep(interval).await;
    }
}

/// One emergency pass: compact oldest files one at a time until the probe
/// reports the pressure gone, or until a pass can make no progress. Any
/// no-progress outcome waits for the next poll rather than retrying
/// immediately. Returns how many files were archived.
fn reclaim_pass<P>(
    config: &PressureConfig,
    on_collision: CollisionPolicy,
    storage_root: &Path,
    archive_root: &Path,
    probe: &P,
) -> usize
where
    P: Fn(&Path) -> io::Result<bool>,
{
    let mut archived = 0;
    loop {
        match probe(storage_root) {
            Ok(true) => {}
            Ok(false) => {
                if archived > 0 {
                    tracing::info!(archived, "free space back above the floor");
                }
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "free space probe failed");
                break;
            }
        }
        let Some(file) = select::select_oldest(storage_root, config.order) else {
            tracing::warn!("storage under pressure but holds no files to compact");
            break;
        };
        match compact::compact(storage_root, &file, archive_root, on_collision) {
            Ok(CompactOutcome::Archived(archive)) => {
                archived += 1;
                tracing::info!(
                    container = %archive.container.display(),
                    original_bytes = archive.original_bytes,
                    compressed_bytes = archive.compressed_bytes,
                    "reclaimed space"
                );
            }
            Ok(CompactOutcome::SkippedExisting { container }) => {
                // The skipped file stays the oldest, so retrying now would
                // pick it again.
                tracing::debug!(
                    container = %container.display(),
                    "oldest file already has a container, waiting"
                );
                break;
            }
            Err(e) => {
                tracing::error!(
                    file = %file.display(),
                    error = %e,
                    "emergency compaction failed"
                );
                break;
            }
        }
    }
    archived
}

/// One retention pass: archive every media file past the age threshold.
/// A failure on one file is reported and does not stop the rest.
fn sweep_pass(
    config: &RetentionConfig,
    on_collision: CollisionPolicy,
    storage_root: &Path,
    archive_root: &Path,
    today: NaiveDate,
) -> usize {
    let candidates: Vec<PathBuf> = select::select_aged(
        storage_root,
        today,
        config.threshold_days,
        &config.extensions,
    )
    .collect();

    let mut archived = 0;
    for file in candidates {
        match compact::compact(storage_root, &file, archive_root, on_collision) {
            Ok(CompactOutcome::Archived(archive)) => {
                archived += 1;
                tracing::info!(
                    container = %archive.container.display(),
                    original_bytes = archive.original_bytes,
                    compressed_bytes = archive.compressed_bytes,
                    "archived aged file"
                );
            }
            Ok(CompactOutcome::SkippedExisting { container }) => {
                tracing::debug!(
                    container = %container.display(),
                    "container already present, leaving file"
                );
            }
            Err(e) => {
                tracing::warn!(
                    file = %file.display(),
                    error = %e,
                    "failed to archive aged file"
                );
            }
        }
    }
    if archived > 0 {
        tracing::info!(archived, "retention sweep complete");
    } else {
        tracing::debug!("retention sweep found nothing eligible");
    }
    archived
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
