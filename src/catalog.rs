#![forbid(unsafe_code)]

//! Catalog persistence: which artists, albums and songs have already been seen.
//!
//! A row only means "already processed"; nothing here describes playback
//! metadata. Every insert is an idempotent upsert keyed by URL, so adding the
//! same URL twice hands back the id of the first row.

use std::path::{Path, PathBuf};

use libsql::{Builder, Connection, Rows, params};
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::url_kind::host_variants;

pub type RowId = i64;

const ARTISTS: &str = "artists";
const ALBUMS: &str = "albums";
const SONGS: &str = "songs";

/// Where the catalog lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogConfig {
    /// SQLite-compatible file on local disk.
    Local { path: PathBuf },
    /// libsql server reached over HTTP.
    Remote { url: String, auth_token: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistRecord {
    pub id: RowId,
    pub url: String,
    pub auto_download: bool,
}

async fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        "#,
    )
    .await?;
    Ok(())
}

async fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS artists (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            url TEXT NOT NULL UNIQUE,
            auto_download INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS albums (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            url TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS songs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            url TEXT NOT NULL UNIQUE
        );

        CREATE INDEX IF NOT EXISTS idx_artists_auto_download ON artists(auto_download);
        "#,
    )
    .await?;
    Ok(())
}

/// Handle on the catalog database. Each method runs a single statement (or a
/// short lookup sequence for songs); nothing spans a transaction.
pub struct CatalogStore {
    conn: Connection,
}

impl CatalogStore {
    pub async fn open(config: &CatalogConfig) -> Result<Self> {
        match config {
            CatalogConfig::Local { path } => Self::open_local(path).await,
            CatalogConfig::Remote { url, auth_token } => {
                let db = Builder::new_remote(url.clone(), auth_token.clone())
                    .build()
                    .await?;
                let conn = db.connect()?;
                ensure_schema(&conn).await?;
                Ok(Self { conn })
            }
        }
    }

    /// Opens (and if necessary creates) a local catalog file.
    pub async fn open_local(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|err| {
                Error::Storage(format!(
                    "creating catalog directory {}: {err}",
                    parent.display()
                ))
            })?;
        }

        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;
        configure_connection(&conn).await?;
        ensure_schema(&conn).await?;
        Ok(Self { conn })
    }

    /// Inserts the artist, or raises its auto-download flag when asked to.
    /// The flag never goes back down.
    pub async fn add_artist(&self, url: &str, auto_download: bool) -> Result<RowId> {
        let mut rows = self
            .conn
            .query(
                r#"
                INSERT INTO artists (url, auto_download) VALUES (?1, ?2)
                ON CONFLICT(url) DO UPDATE SET
                    auto_download = MAX(artists.auto_download, excluded.auto_download)
                RETURNING id
                "#,
                params![url, i64::from(auto_download)],
            )
            .await?;
        returned_id(&mut rows, ARTISTS, url).await
    }

    pub async fn get_artist(&self, url: &str) -> Result<Option<ArtistRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, url, auto_download FROM artists WHERE url = ?1",
                [url],
            )
            .await?;
        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        Ok(Some(ArtistRecord {
            id: row.get(0)?,
            url: row.get(1)?,
            auto_download: row.get::<i64>(2)? != 0,
        }))
    }

    pub async fn get_artist_id(&self, url: &str) -> Result<Option<RowId>> {
        self.lookup_id(ARTISTS, url).await
    }

    /// URLs of every artist flagged for auto-download, oldest first.
    pub async fn get_auto_download_artists(&self) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT url FROM artists WHERE auto_download != 0 ORDER BY id ASC",
                params![],
            )
            .await?;
        let mut urls = Vec::new();
        while let Some(row) = rows.next().await? {
            urls.push(row.get::<String>(0)?);
        }
        Ok(urls)
    }

    pub async fn add_album(&self, url: &str) -> Result<RowId> {
        self.upsert_url(ALBUMS, url).await
    }

    pub async fn get_album(&self, url: &str) -> Result<Option<RowId>> {
        self.lookup_id(ALBUMS, url).await
    }

    /// Administrative cleanup. Removing an unknown album is not an error.
    pub async fn remove_album(&self, url: &str) -> Result<()> {
        let removed = self
            .conn
            .execute("DELETE FROM albums WHERE url = ?1", [url])
            .await?;
        debug!(url, removed, "removed album rows");
        Ok(())
    }

    pub async fn add_song(&self, url: &str) -> Result<RowId> {
        self.upsert_url(SONGS, url).await
    }

    /// Looks the song up by exact URL first, then under the other YouTube
    /// hosts.
    pub async fn get_song(&self, url: &str) -> Result<Option<RowId>> {
        if let Some(id) = self.lookup_id(SONGS, url).await? {
            return Ok(Some(id));
        }
        for variant in host_variants(url) {
            if let Some(id) = self.lookup_id(SONGS, &variant).await? {
                debug!(url, variant = %variant, "song matched under alternate host");
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    /// Shared insert for the url-only tables. The no-op update makes
    /// `RETURNING` yield the existing id on conflict.
    async fn upsert_url(&self, table: &str, url: &str) -> Result<RowId> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    r#"
                    INSERT INTO {table} (url) VALUES (?1)
                    ON CONFLICT(url) DO UPDATE SET url = excluded.url
                    RETURNING id
                    "#
                ),
                [url],
            )
            .await?;
        returned_id(&mut rows, table, url).await
    }

    async fn lookup_id(&self, table: &str, url: &str) -> Result<Option<RowId>> {
        let mut rows = self
            .conn
            .query(&format!("SELECT id FROM {table} WHERE url = ?1"), [url])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }
}

async fn returned_id(rows: &mut Rows, table: &str, url: &str) -> Result<RowId> {
    let row = rows
        .next()
        .await?
        .ok_or_else(|| Error::Storage(format!("upsert into {table} returned no id for {url}")))?;
    Ok(row.get(0)?)
}
