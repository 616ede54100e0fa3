#![forbid(unsafe_code)]

//! Recording fakes for the queue and metadata traits, shared by the library
//! tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::catalog::{CatalogConfig, CatalogStore};
use crate::error::{Error, Result};
use crate::metadata::MetadataFetcher;
use crate::queue::{AudioFormat, DownloadQueue, QueueResponse};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedCall {
    pub url: String,
    pub quality: String,
    pub format: AudioFormat,
}

/// Queue that accepts everything except the URLs listed in `failures`.
#[derive(Default)]
pub struct RecordingQueue {
    calls: Mutex<Vec<QueuedCall>>,
    failures: Mutex<HashMap<String, u16>>,
}

impl RecordingQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_with(&self, url: &str, status: u16) {
        self.failures.lock().insert(url.to_owned(), status);
    }

    pub fn calls(&self) -> Vec<QueuedCall> {
        self.calls.lock().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls.lock().iter().map(|call| call.url.clone()).collect()
    }
}

#[async_trait]
impl DownloadQueue for RecordingQueue {
    async fn submit(&self, url: &str, quality: &str, format: AudioFormat) -> Result<QueueResponse> {
        self.calls.lock().push(QueuedCall {
            url: url.to_owned(),
            quality: quality.to_owned(),
            format,
        });
        if let Some(status) = self.failures.lock().get(url).copied() {
            return Err(Error::QueueSubmission {
                url: url.to_owned(),
                status,
                body: "rejected".into(),
            });
        }
        Ok(QueueResponse {
            status: 200,
            body: "{\"status\":\"ok\"}".into(),
        })
    }
}

/// Fetcher backed by fixed channel and playlist maps. Unknown keys yield an
/// `Error::Metadata`, mirroring a listing that came back empty.
#[derive(Default)]
pub struct StaticFetcher {
    channels: Mutex<HashMap<String, Vec<String>>>,
    playlists: Mutex<HashMap<String, Vec<String>>>,
    broken_playlists: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_channel(&self, channel_url: &str, albums: &[&str]) {
        self.channels.lock().insert(
            channel_url.to_owned(),
            albums.iter().map(|album| album.to_string()).collect(),
        );
    }

    pub fn with_playlist(&self, playlist_id: &str, songs: &[&str]) {
        self.playlists.lock().insert(
            playlist_id.to_owned(),
            songs.iter().map(|song| song.to_string()).collect(),
        );
    }

    pub fn break_playlist(&self, playlist_id: &str) {
        self.broken_playlists.lock().insert(playlist_id.to_owned());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl MetadataFetcher for StaticFetcher {
    async fn album_urls(&self, channel_url: &str) -> Result<Vec<String>> {
        self.calls.lock().push(format!("albums:{channel_url}"));
        self.channels
            .lock()
            .get(channel_url)
            .cloned()
            .ok_or_else(|| Error::Metadata(format!("No album details found for {channel_url}")))
    }

    async fn album_songs(&self, playlist_id: &str) -> Result<Vec<String>> {
        self.calls.lock().push(format!("songs:{playlist_id}"));
        if self.broken_playlists.lock().contains(playlist_id) {
            return Err(Error::Metadata(format!("listing {playlist_id} failed")));
        }
        Ok(self
            .playlists
            .lock()
            .get(playlist_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Fresh on-disk catalog. Keep the directory alive for the store's lifetime.
pub async fn temp_catalog() -> (TempDir, Arc<CatalogStore>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");
    let store = CatalogStore::open(&CatalogConfig::Local { path })
        .await
        .unwrap();
    (dir, Arc::new(store))
}
