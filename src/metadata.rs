#![forbid(unsafe_code)]

//! Expands channels and albums into the URLs they contain.
//!
//! The production fetcher shells out to `yt-dlp --flat-playlist`, which lists
//! a playlist or a channel's releases tab without resolving every entry.

use std::path::{Path, PathBuf};
use std::process::Command;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::url_kind::{album_url, channel_id, song_url};

#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    /// Album and EP URLs released by the channel behind `channel_url`.
    /// Single-track releases are left out.
    async fn album_urls(&self, channel_url: &str) -> Result<Vec<String>>;

    /// Song URLs of the playlist, each carrying `&list=<playlist_id>`.
    async fn album_songs(&self, playlist_id: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Deserialize)]
struct FlatPlaylist {
    #[serde(default)]
    entries: Vec<FlatEntry>,
}

#[derive(Debug, Deserialize)]
struct FlatEntry {
    id: Option<String>,
    /// Track count, when the releases tab reports it.
    playlist_count: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    program: PathBuf,
}

impl YtDlpFetcher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn flat_playlist(&self, target: String) -> Result<FlatPlaylist> {
        let program = self.program.clone();
        tokio::task::spawn_blocking(move || run_flat_playlist(&program, &target))
            .await
            .map_err(|err| Error::Metadata(format!("metadata task failed: {err}")))?
    }

    async fn track_count(&self, playlist_id: &str) -> Result<u64> {
        let listing = self.flat_playlist(album_url(playlist_id)).await?;
        Ok(listing.entries.len() as u64)
    }
}

fn run_flat_playlist(program: &Path, target: &str) -> Result<FlatPlaylist> {
    debug!(program = %program.display(), target, "listing playlist entries");
    let output = Command::new(program)
        .arg("--flat-playlist")
        .arg("--dump-single-json")
        .arg("--no-warnings")
        .arg(target)
        .output()
        .map_err(|err| {
            Error::Metadata(format!(
                "failed to run {} for {target}: {err}",
                program.display()
            ))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Metadata(format!(
            "listing {target} failed ({}): {}",
            output.status,
            stderr.trim()
        )));
    }

    serde_json::from_slice(&output.stdout)
        .map_err(|err| Error::Metadata(format!("unreadable listing for {target}: {err}")))
}

#[async_trait]
impl MetadataFetcher for YtDlpFetcher {
    async fn album_urls(&self, channel_url: &str) -> Result<Vec<String>> {
        let id = channel_id(channel_url)?;
        let listing = self
            .flat_playlist(format!("https://www.youtube.com/channel/{id}/releases"))
            .await?;

        if listing.entries.is_empty() {
            return Err(Error::Metadata(format!(
                "No album details found for {channel_url}"
            )));
        }

        let mut albums = Vec::with_capacity(listing.entries.len());
        for entry in listing.entries {
            let Some(playlist_id) = entry.id else {
                return Err(Error::Metadata(format!(
                    "release without playlist id in {channel_url}"
                )));
            };
            let tracks = match entry.playlist_count {
                Some(count) => count,
                None => self.track_count(&playlist_id).await?,
            };
            if tracks <= 1 {
                debug!(channel_url, playlist_id, tracks, "skipping single");
                continue;
            }
            albums.push(album_url(&playlist_id));
        }
        Ok(albums)
    }

    async fn album_songs(&self, playlist_id: &str) -> Result<Vec<String>> {
        let listing = self.flat_playlist(album_url(playlist_id)).await?;

        // Unavailable tracks show up without an id.
        Ok(listing
            .entries
            .into_iter()
            .filter_map(|entry| entry.id)
            .map(|id| song_url(&id, playlist_id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn make_executable(path: &Path) {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(path).unwrap().permissions();
            perms.set_mode(0o755);
            fs::set_permissions(path, perms).unwrap();
        }
    }

    /// Writes a fake yt-dlp that logs its arguments to `args.log` and answers
    /// with `body` (or fails when `exit_code` is non-zero).
    fn install_ytdlp_stub(dir: &Path, body: &str, exit_code: i32) -> PathBuf {
        let script_path = dir.join("yt-dlp");
        let log_path = dir.join("args.log");
        let script = format!(
            r#"#!/usr/bin/env bash
set -eu
printf '%s\n' "$@" > '{log}'
if [[ {exit_code} -ne 0 ]]; then
  echo "ERROR: listing unavailable" >&2
  exit {exit_code}
fi
cat <<'JSON'
{body}
JSON
"#,
            log = log_path.display(),
        );
        fs::write(&script_path, script).unwrap();
        make_executable(&script_path);
        script_path
    }

    /// Writes a fake yt-dlp that answers from `<dir>/listings/<key>.json`,
    /// where the key is the last path segment or `list=` value of the target.
    /// Every requested target is appended to `targets.log`.
    fn install_routing_ytdlp_stub(dir: &Path, listings: &[(&str, &str)]) -> PathBuf {
        let listing_dir = dir.join("listings");
        fs::create_dir_all(&listing_dir).unwrap();
        for (key, body) in listings {
            fs::write(listing_dir.join(format!("{key}.json")), body).unwrap();
        }

        let script_path = dir.join("yt-dlp");
        let script = format!(
            r#"#!/usr/bin/env bash
set -eu
target="${{@: -1}}"
printf '%s\n' "$target" >> '{log}'
case "$target" in
  *list=*) key="${{target##*list=}}" ;;
  *) key="${{target##*/}}" ;;
esac
cat '{listings}'/"$key".json
"#,
            log = dir.join("targets.log").display(),
            listings = listing_dir.display(),
        );
        fs::write(&script_path, script).unwrap();
        make_executable(&script_path);
        script_path
    }

    fn logged_args(dir: &Path) -> Vec<String> {
        fs::read_to_string(dir.join("args.log"))
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[tokio::test]
    async fn album_urls_lists_channel_releases() {
        let temp = tempfile::tempdir().unwrap();
        let stub = install_ytdlp_stub(
            temp.path(),
            r#"{"id":"UCabc","entries":[{"id":"PL1","playlist_count":11},{"id":"PL2","playlist_count":4}]}"#,
            0,
        );
        let fetcher = YtDlpFetcher::new(stub);

        let albums = fetcher
            .album_urls("https://music.youtube.com/channel/UCabc")
            .await
            .unwrap();
        assert_eq!(
            albums,
            vec![
                "https://music.youtube.com/playlist?list=PL1".to_string(),
                "https://music.youtube.com/playlist?list=PL2".to_string(),
            ]
        );
        assert_eq!(
            logged_args(temp.path()),
            vec![
                "--flat-playlist",
                "--dump-single-json",
                "--no-warnings",
                "https://www.youtube.com/channel/UCabc/releases",
            ]
        );
    }

    #[tokio::test]
    async fn album_urls_skips_single_track_releases() {
        let temp = tempfile::tempdir().unwrap();
        let stub = install_routing_ytdlp_stub(
            temp.path(),
            &[
                (
                    "releases",
                    r#"{"entries":[{"id":"PLalbum"},{"id":"PLsingle"},{"id":"PLep","playlist_count":3},{"id":"PLcounted","playlist_count":1}]}"#,
                ),
                ("PLalbum", r#"{"entries":[{"id":"A1"},{"id":"A2"}]}"#),
                ("PLsingle", r#"{"entries":[{"id":"S1"}]}"#),
            ],
        );
        let fetcher = YtDlpFetcher::new(stub);

        let albums = fetcher
            .album_urls("https://music.youtube.com/channel/UCmixed")
            .await
            .unwrap();
        assert_eq!(
            albums,
            vec![
                "https://music.youtube.com/playlist?list=PLalbum".to_string(),
                "https://music.youtube.com/playlist?list=PLep".to_string(),
            ]
        );

        // Releases with a reported count are not listed again.
        let targets = fs::read_to_string(temp.path().join("targets.log")).unwrap();
        assert_eq!(
            targets.lines().collect::<Vec<_>>(),
            vec![
                "https://www.youtube.com/channel/UCmixed/releases",
                "https://music.youtube.com/playlist?list=PLalbum",
                "https://music.youtube.com/playlist?list=PLsingle",
            ]
        );
    }

    #[tokio::test]
    async fn album_urls_with_only_singles_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        let stub = install_ytdlp_stub(
            temp.path(),
            r#"{"entries":[{"id":"PL1","playlist_count":1},{"id":"PL2","playlist_count":0}]}"#,
            0,
        );
        let fetcher = YtDlpFetcher::new(stub);

        let albums = fetcher
            .album_urls("https://music.youtube.com/channel/UCsingles")
            .await
            .unwrap();
        assert!(albums.is_empty());
    }

    #[tokio::test]
    async fn album_urls_without_releases_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let stub = install_ytdlp_stub(temp.path(), r#"{"entries":[]}"#, 0);
        let fetcher = YtDlpFetcher::new(stub);

        let err = fetcher
            .album_urls("https://music.youtube.com/channel/UCempty")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Metadata(ref message) if message.contains("No album details found")));
    }

    #[tokio::test]
    async fn album_urls_rejects_url_without_channel_id() {
        let fetcher = YtDlpFetcher::new("/nonexistent/yt-dlp");
        let err = fetcher
            .album_urls("https://music.youtube.com/channel/")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedUrl { .. }));
    }

    #[tokio::test]
    async fn album_songs_skips_entries_without_id() {
        let temp = tempfile::tempdir().unwrap();
        let stub = install_ytdlp_stub(
            temp.path(),
            r#"{"entries":[{"id":"S1"},{"title":"gone"},{"id":"S2"}]}"#,
            0,
        );
        let fetcher = YtDlpFetcher::new(stub);

        let songs = fetcher.album_songs("PL1").await.unwrap();
        assert_eq!(
            songs,
            vec![
                "https://music.youtube.com/watch?v=S1&list=PL1".to_string(),
                "https://music.youtube.com/watch?v=S2&list=PL1".to_string(),
            ]
        );
        assert_eq!(
            logged_args(temp.path()).last().map(String::as_str),
            Some("https://music.youtube.com/playlist?list=PL1")
        );
    }

    #[tokio::test]
    async fn failing_command_surfaces_stderr() {
        let temp = tempfile::tempdir().unwrap();
        let stub = install_ytdlp_stub(temp.path(), "{}", 2);
        let fetcher = YtDlpFetcher::new(stub);

        let err = fetcher.album_songs("PL1").await.unwrap_err();
        assert!(matches!(err, Error::Metadata(ref message) if message.contains("listing unavailable")));
    }

    #[tokio::test]
    async fn missing_program_is_metadata_error() {
        let fetcher = YtDlpFetcher::new("/nonexistent/yt-dlp");
        let err = fetcher.album_songs("PL1").await.unwrap_err();
        assert!(matches!(err, Error::Metadata(_)));
    }
}
