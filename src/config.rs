#![forbid(unsafe_code)]

use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

use crate::catalog::CatalogConfig;
use crate::dispatcher::{DEFAULT_QUALITY, DownloadOptions};
use crate::error::{Error, Result};
use crate::queue::AudioFormat;

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_LISTEN_PORT: u16 = 8080;
pub const DEFAULT_LISTEN_HOST: &str = "127.0.0.1";
pub const DEFAULT_YT_DLP: &str = "yt-dlp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub catalog: CatalogConfig,
    pub queue_url: String,
    pub listen_host: String,
    pub listen_port: u16,
    pub www_root: Option<PathBuf>,
    pub yt_dlp: PathBuf,
    pub quality: String,
    pub format: AudioFormat,
}

impl RuntimeConfig {
    /// Download options used when a caller does not pick its own.
    pub fn default_options(&self) -> DownloadOptions {
        DownloadOptions {
            quality: self.quality.clone(),
            format: self.format,
            add_without_download: false,
        }
    }
}

/// Command-line values; each one beats both the environment and the `.env`
/// file.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOverrides {
    pub env_path: Option<PathBuf>,
    pub queue_url: Option<String>,
    pub db_path: Option<PathBuf>,
    pub listen_host: Option<String>,
    pub listen_port: Option<u16>,
    pub www_root: Option<PathBuf>,
    pub yt_dlp: Option<PathBuf>,
}

pub fn resolve_runtime_config(overrides: RuntimeOverrides) -> Result<RuntimeConfig> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    build_runtime_config_with_overrides(&file_vars, env_var_string, overrides)
}

#[cfg(test)]
fn build_runtime_config(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<RuntimeConfig> {
    build_runtime_config_with_overrides(file_vars, env_lookup, RuntimeOverrides::default())
}

fn build_runtime_config_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: RuntimeOverrides,
) -> Result<RuntimeConfig> {
    let lookup = |key: &str| lookup_value(key, file_vars, &env_lookup);

    let queue_url = non_blank(overrides.queue_url)
        .or_else(|| lookup("ME_TUBE_API_URL"))
        .ok_or_else(|| missing("ME_TUBE_API_URL"))?;

    let db_path = overrides
        .db_path
        .or_else(|| lookup("DB_PATH").map(PathBuf::from));
    let catalog = match db_path {
        Some(path) => CatalogConfig::Local { path },
        None => remote_catalog(&lookup)?,
    };

    let listen_port = overrides
        .listen_port
        .or_else(|| lookup("MUSICAPI_PORT").and_then(|value| value.parse::<u16>().ok()))
        .unwrap_or(DEFAULT_LISTEN_PORT);
    let listen_host = non_blank(overrides.listen_host)
        .or_else(|| lookup("MUSICAPI_HOST"))
        .unwrap_or_else(|| DEFAULT_LISTEN_HOST.to_string());
    let www_root = overrides
        .www_root
        .or_else(|| lookup("WWW_ROOT").map(PathBuf::from));
    let yt_dlp = overrides
        .yt_dlp
        .or_else(|| lookup("YT_DLP_BIN").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_YT_DLP));
    let quality = lookup("DOWNLOAD_QUALITY").unwrap_or_else(|| DEFAULT_QUALITY.to_string());
    let format = match lookup("DOWNLOAD_FORMAT") {
        Some(value) => value
            .parse::<AudioFormat>()
            .map_err(|err| Error::Configuration(format!("DOWNLOAD_FORMAT: {err}")))?,
        None => AudioFormat::default(),
    };

    Ok(RuntimeConfig {
        catalog,
        queue_url,
        listen_host,
        listen_port,
        www_root,
        yt_dlp,
        quality,
        format,
    })
}

/// Remote libsql server. `DB_URL` names it directly (`libsql://music-org.turso.io`,
/// `http://127.0.0.1:8081`); otherwise it is `DB_HOST` plus `DB_PORT`, over
/// https unless the host carries its own scheme. `libsql://` is spelled as
/// https for the HTTP client. `DB_AUTH_TOKEN` is always required.
fn remote_catalog(lookup: &impl Fn(&str) -> Option<String>) -> Result<CatalogConfig> {
    let url = match lookup("DB_URL") {
        Some(url) => {
            let url = url.trim_end_matches('/');
            match url.strip_prefix("libsql://") {
                Some(rest) => format!("https://{rest}"),
                None => url.to_string(),
            }
        }
        None => {
            let host = lookup("DB_HOST").ok_or_else(|| missing("DB_PATH, DB_URL or DB_HOST"))?;
            let port_raw = lookup("DB_PORT").ok_or_else(|| missing("DB_PORT"))?;
            let port = port_raw.parse::<u16>().map_err(|_| {
                Error::Configuration(format!("DB_PORT is not a valid port: {port_raw}"))
            })?;
            let (scheme, host) = host.split_once("://").unwrap_or(("https", host.as_str()));
            format!("{scheme}://{}:{port}", host.trim_end_matches('/'))
        }
    };
    let auth_token = lookup("DB_AUTH_TOKEN").ok_or_else(|| missing("DB_AUTH_TOKEN"))?;
    Ok(CatalogConfig::Remote { url, auth_token })
}

fn missing(key: &str) -> Error {
    Error::Configuration(format!("{key} not set"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_var_string(key: &str) -> Option<String> {
    non_blank(env::var(key).ok())
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| non_blank(file_vars.get(key).cloned()))
}

/// Reads `KEY=value` lines. Values may be quoted; an unquoted value ends at
/// a ` #` comment, a quoted one keeps everything between its quotes.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = fs::read_to_string(path)
        .map_err(|err| Error::Configuration(format!("Reading {}: {err}", path.display())))?;
    Ok(content.lines().filter_map(parse_env_line).collect())
}

fn parse_env_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, raw) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    let raw = raw.trim();
    let value = match raw.chars().next() {
        Some(quote @ ('"' | '\'')) => {
            let inner = &raw[1..];
            match inner.find(quote) {
                Some(end) => &inner[..end],
                None => raw,
            }
        }
        Some('#') => "",
        _ => raw
            .find(" #")
            .map_or(raw, |comment| &raw[..comment])
            .trim_end(),
    };
    Some((key.to_string(), value.to_string()))
}
