#![forbid(unsafe_code)]

//! Unattended refresh of every artist flagged for auto-download. Meant to be
//! run from cron; new releases are queued, known ones are skipped.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use musicapi_tools::{
    config::{RuntimeOverrides, resolve_runtime_config},
    dispatcher::DispatchStatus,
    logging,
    submission::{ArtistRefresh, SubmissionHandler},
};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "auto_download",
    about = "Queue new releases for every auto-download artist"
)]
struct RefreshArgs {
    #[arg(long)]
    env_file: Option<PathBuf>,
    #[arg(long)]
    db_path: Option<PathBuf>,
    /// yt-dlp program used to list releases.
    #[arg(long)]
    yt_dlp: Option<PathBuf>,
}

impl RefreshArgs {
    fn into_overrides(self) -> RuntimeOverrides {
        RuntimeOverrides {
            env_path: self.env_file,
            db_path: self.db_path,
            yt_dlp: self.yt_dlp,
            ..RuntimeOverrides::default()
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct RefreshSummary {
    artists: usize,
    failed_artists: usize,
    queued: usize,
    already_queued: usize,
    failed_albums: usize,
}

fn summarize(refreshes: &[ArtistRefresh]) -> RefreshSummary {
    let mut summary = RefreshSummary {
        artists: refreshes.len(),
        ..RefreshSummary::default()
    };
    for refresh in refreshes {
        let Ok(albums) = &refresh.albums else {
            summary.failed_artists += 1;
            continue;
        };
        for album in albums {
            match album {
                Ok(outcome) if outcome.status == DispatchStatus::AlreadyQueued => {
                    summary.already_queued += 1
                }
                Ok(_) => summary.queued += 1,
                Err(_) => summary.failed_albums += 1,
            }
        }
    }
    summary
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = RefreshArgs::parse();
    let config = resolve_runtime_config(args.into_overrides()).context("loading configuration")?;
    let handler = SubmissionHandler::connect(&config)
        .await
        .context("initializing submission handler")?;

    let refreshes = handler
        .refresh_auto_download_artists(&config.default_options())
        .await
        .context("refreshing auto-download artists")?;

    for refresh in &refreshes {
        if let Err(err) = &refresh.albums {
            warn!(artist = %refresh.artist_url, error = %err, "artist refresh failed");
        }
    }

    let summary = summarize(&refreshes);
    info!(
        artists = summary.artists,
        failed_artists = summary.failed_artists,
        queued = summary.queued,
        already_queued = summary.already_queued,
        failed_albums = summary.failed_albums,
        "auto-download refresh finished"
    );
    Ok(())
}
