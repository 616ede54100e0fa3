#![forbid(unsafe_code)]

//! URL classification and the small string helpers built on top of it.
//!
//! Every branch in the dispatcher and the submission handler starts from
//! [`classify`], so the marker checks live in exactly one place.

use serde::Serialize;

use crate::error::{Error, Result};

const CHANNEL_MARKER: &str = "channel/";
const PLAYLIST_MARKER: &str = "playlist?list=";
const WATCH_MARKER: &str = "watch?v=";

const MUSIC_HOST: &str = "music.youtube.com";
const PLAIN_HOST: &str = "youtube.com";
const WWW_HOST: &str = "www.youtube.com";

/// What a submitted URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlKind {
    Song,
    Album,
    Channel,
    Unsupported,
}

impl UrlKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Song => "song",
            Self::Album => "album",
            Self::Channel => "channel",
            Self::Unsupported => "unsupported",
        }
    }
}

/// Markers are checked channel first, then playlist, then watch. A song URL
/// taken from an album listing (`watch?v=…&list=…`) is still a song because it
/// never contains `playlist?list=`.
pub fn classify(url: &str) -> UrlKind {
    if url.contains(CHANNEL_MARKER) {
        UrlKind::Channel
    } else if url.contains(PLAYLIST_MARKER) {
        UrlKind::Album
    } else if url.contains(WATCH_MARKER) {
        UrlKind::Song
    } else {
        UrlKind::Unsupported
    }
}

/// Extracts the `list=` value of a playlist URL.
pub fn playlist_id(url: &str) -> Result<String> {
    let (_, tail) = url
        .split_once("list=")
        .ok_or_else(|| Error::malformed(url, "missing list= parameter"))?;
    let id = tail.split(['&', '#']).next().unwrap_or_default().trim();
    if id.is_empty() {
        return Err(Error::malformed(url, "empty playlist id"));
    }
    Ok(id.to_owned())
}

/// Extracts the id following `channel/`.
pub fn channel_id(url: &str) -> Result<String> {
    let (_, tail) = url
        .split_once(CHANNEL_MARKER)
        .ok_or_else(|| Error::malformed(url, "missing channel/<id> segment"))?;
    let id = tail.split(['/', '?', '#']).next().unwrap_or_default().trim();
    if id.is_empty() {
        return Err(Error::malformed(url, "empty channel id"));
    }
    Ok(id.to_owned())
}

pub fn album_url(playlist_id: &str) -> String {
    format!("https://{MUSIC_HOST}/playlist?list={playlist_id}")
}

pub fn song_url(video_id: &str, playlist_id: &str) -> String {
    format!("https://{MUSIC_HOST}/watch?v={video_id}&list={playlist_id}")
}

/// Same URL under the other YouTube hosts, used when looking up songs.
///
/// `music.youtube.com` maps to `youtube.com` and `www.youtube.com`; either
/// plain host maps to `music.youtube.com`. Anything else has no variants.
pub fn host_variants(url: &str) -> Vec<String> {
    let Some((scheme, rest)) = url.split_once("://") else {
        return Vec::new();
    };
    let (host, path) = match rest.find(['/', '?', '#']) {
        Some(index) => rest.split_at(index),
        None => (rest, ""),
    };

    let alternates: &[&str] = match host.to_ascii_lowercase().as_str() {
        MUSIC_HOST => &[PLAIN_HOST, WWW_HOST],
        PLAIN_HOST | WWW_HOST => &[MUSIC_HOST],
        _ => &[],
    };

    alternates
        .iter()
        .map(|alternate| format!("{scheme}://{alternate}{path}"))
        .collect()
}
