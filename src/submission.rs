#![forbid(unsafe_code)]

//! Entry point for user submissions: classifies the URL, expands channels
//! into their albums and hands everything else to the [`Dispatcher`].

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::catalog::CatalogStore;
use crate::config::RuntimeConfig;
use crate::dispatcher::{DispatchOutcome, Dispatcher, DownloadOptions};
use crate::error::{Error, Result};
use crate::metadata::YtDlpFetcher;
use crate::queue::MeTubeQueue;
use crate::url_kind::{UrlKind, classify};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub url: String,
    /// Only meaningful for channels: flag the artist for future refreshes.
    pub auto_download: bool,
    pub options: DownloadOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReport {
    pub kind: UrlKind,
    pub outcomes: Vec<DispatchOutcome>,
}

/// Result of refreshing one auto-download artist.
#[derive(Debug)]
pub struct ArtistRefresh {
    pub artist_url: String,
    /// Per-album results, or the error that stopped the artist's listing.
    pub albums: Result<Vec<Result<DispatchOutcome>>>,
}

#[derive(Clone)]
pub struct SubmissionHandler {
    dispatcher: Dispatcher,
}

impl SubmissionHandler {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Wires the production collaborators: the configured catalog, MeTube and
    /// yt-dlp.
    pub async fn connect(config: &RuntimeConfig) -> Result<Self> {
        let queue = MeTubeQueue::new(config.queue_url.clone())?;
        let catalog = CatalogStore::open(&config.catalog).await?;
        let fetcher = YtDlpFetcher::new(config.yt_dlp.clone());
        info!(queue = %queue.add_endpoint(), "submission handler ready");
        Ok(Self::new(Dispatcher::new(
            Arc::new(catalog),
            Arc::new(queue),
            Arc::new(fetcher),
        )))
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub async fn handle(&self, submission: &Submission) -> Result<SubmissionReport> {
        let url = submission.url.as_str();
        let kind = classify(url);
        let outcomes = match kind {
            UrlKind::Unsupported => return Err(Error::UnsupportedUrl(url.to_owned())),
            UrlKind::Channel => self.handle_channel(submission).await?,
            UrlKind::Album | UrlKind::Song => {
                vec![self.dispatcher.dispatch(url, &submission.options).await?]
            }
        };
        Ok(SubmissionReport { kind, outcomes })
    }

    /// Albums are dispatched in listing order; the first failure aborts the
    /// rest while albums already handled stay recorded.
    async fn handle_channel(&self, submission: &Submission) -> Result<Vec<DispatchOutcome>> {
        let channel_url = submission.url.as_str();
        let albums = self.dispatcher.fetcher().album_urls(channel_url).await?;
        self.dispatcher
            .catalog()
            .add_artist(channel_url, submission.auto_download)
            .await?;
        info!(
            channel = channel_url,
            albums = albums.len(),
            auto_download = submission.auto_download,
            "expanding channel"
        );

        let mut outcomes = Vec::with_capacity(albums.len());
        for album_url in albums {
            match self.dispatcher.dispatch(&album_url, &submission.options).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(source) => {
                    error!(channel = channel_url, album = %album_url, error = %source, "aborting channel");
                    return Err(Error::ChannelAlbum {
                        album_url,
                        source: Box::new(source),
                    });
                }
            }
        }
        Ok(outcomes)
    }

    /// Re-lists every auto-download artist and dispatches their albums. A
    /// failing artist is logged and the next one is processed.
    pub async fn refresh_auto_download_artists(
        &self,
        options: &DownloadOptions,
    ) -> Result<Vec<ArtistRefresh>> {
        let artists = self.dispatcher.catalog().get_auto_download_artists().await?;
        info!(artists = artists.len(), "refreshing auto-download artists");

        let mut refreshes = Vec::with_capacity(artists.len());
        for artist_url in artists {
            let albums = match self.dispatcher.fetcher().album_urls(&artist_url).await {
                Ok(albums) => {
                    let batch: Vec<Option<String>> = albums.into_iter().map(Some).collect();
                    Ok(self
                        .dispatcher
                        .dispatch_batch(&batch, options)
                        .await
                        .into_iter()
                        .flatten()
                        .collect())
                }
                Err(err) => {
                    warn!(artist = %artist_url, error = %err, "skipping artist");
                    Err(err)
                }
            };
            refreshes.push(ArtistRefresh { artist_url, albums });
        }
        Ok(refreshes)
    }
}
