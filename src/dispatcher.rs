#![forbid(unsafe_code)]

//! Decides, per song or album URL, whether to hand it to the download queue
//! and records what was handed over.
//!
//! The check-before-submit order means a URL already in the catalog never
//! reaches the queue again. Two processes racing on the same URL can both
//! submit it; the catalog upsert keeps a single row either way.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::CatalogStore;
use crate::error::{Error, Result};
use crate::metadata::MetadataFetcher;
use crate::queue::{AudioFormat, DownloadQueue};
use crate::url_kind::{UrlKind, classify, playlist_id};

pub const DEFAULT_QUALITY: &str = "best";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DownloadOptions {
    pub quality: String,
    pub format: AudioFormat,
    /// Record the URL without asking the queue to download it.
    pub add_without_download: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY.to_owned(),
            format: AudioFormat::default(),
            add_without_download: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DispatchStatus {
    /// Submitted to the queue and recorded.
    Queued,
    /// Recorded only.
    Recorded,
    /// Already in the catalog; nothing done.
    AlreadyQueued,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongFailure {
    pub url: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub url: String,
    pub kind: UrlKind,
    pub status: DispatchStatus,
    /// Song URLs recorded while expanding an album.
    pub songs: Vec<String>,
    pub song_failures: Vec<SongFailure>,
}

impl DispatchOutcome {
    fn new(url: &str, kind: UrlKind, status: DispatchStatus) -> Self {
        Self {
            url: url.to_owned(),
            kind,
            status,
            songs: Vec::new(),
            song_failures: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    catalog: Arc<CatalogStore>,
    queue: Arc<dyn DownloadQueue>,
    fetcher: Arc<dyn MetadataFetcher>,
}

impl Dispatcher {
    pub fn new(
        catalog: Arc<CatalogStore>,
        queue: Arc<dyn DownloadQueue>,
        fetcher: Arc<dyn MetadataFetcher>,
    ) -> Self {
        Self {
            catalog,
            queue,
            fetcher,
        }
    }

    pub fn catalog(&self) -> &Arc<CatalogStore> {
        &self.catalog
    }

    pub fn fetcher(&self) -> &Arc<dyn MetadataFetcher> {
        &self.fetcher
    }

    /// Dispatches a single song or album URL. Channels are expanded by the
    /// submission handler and are rejected here.
    pub async fn dispatch(&self, url: &str, options: &DownloadOptions) -> Result<DispatchOutcome> {
        match classify(url) {
            UrlKind::Album => self.dispatch_album(url, options).await,
            UrlKind::Song => self.dispatch_song(url, options).await,
            UrlKind::Channel | UrlKind::Unsupported => Err(Error::UnsupportedUrl(url.to_owned())),
        }
    }

    /// Dispatches every present URL in order. One slot per input; `None`
    /// inputs stay `None` and a failure never stops the rest of the batch.
    pub async fn dispatch_batch(
        &self,
        urls: &[Option<String>],
        options: &DownloadOptions,
    ) -> Vec<Option<Result<DispatchOutcome>>> {
        let mut results = Vec::with_capacity(urls.len());
        for url in urls {
            let Some(url) = url else {
                results.push(None);
                continue;
            };
            let result = self.dispatch(url, options).await;
            if let Err(err) = &result {
                warn!(url = %url, error = %err, "dispatch failed, continuing with batch");
            }
            results.push(Some(result));
        }
        results
    }

    async fn dispatch_album(&self, url: &str, options: &DownloadOptions) -> Result<DispatchOutcome> {
        if self.catalog.get_album(url).await?.is_some() {
            info!(url, "album already queued");
            return Ok(DispatchOutcome::new(url, UrlKind::Album, DispatchStatus::AlreadyQueued));
        }

        let playlist = playlist_id(url)?;
        let status = self.submit(url, options).await?;
        self.catalog.add_album(url).await?;

        let mut outcome = DispatchOutcome::new(url, UrlKind::Album, status);
        for song in self.fetcher.album_songs(&playlist).await? {
            match self.catalog.add_song(&song).await {
                Ok(_) => outcome.songs.push(song),
                Err(err) => {
                    warn!(album = url, song = %song, error = %err, "failed to record song");
                    outcome.song_failures.push(SongFailure {
                        url: song,
                        message: err.to_string(),
                    });
                }
            }
        }

        info!(
            url,
            songs = outcome.songs.len(),
            failures = outcome.song_failures.len(),
            "album recorded"
        );
        Ok(outcome)
    }

    async fn dispatch_song(&self, url: &str, options: &DownloadOptions) -> Result<DispatchOutcome> {
        if self.catalog.get_song(url).await?.is_some() {
            info!(url, "song already queued");
            return Ok(DispatchOutcome::new(url, UrlKind::Song, DispatchStatus::AlreadyQueued));
        }

        let status = self.submit(url, options).await?;
        self.catalog.add_song(url).await?;
        info!(url, "song recorded");
        Ok(DispatchOutcome::new(url, UrlKind::Song, status))
    }

    async fn submit(&self, url: &str, options: &DownloadOptions) -> Result<DispatchStatus> {
        if options.add_without_download {
            return Ok(DispatchStatus::Recorded);
        }
        self.queue
            .submit(url, &options.quality, options.format)
            .await?;
        info!(url, quality = %options.quality, format = %options.format, "queued download");
        Ok(DispatchStatus::Queued)
    }
}
