#![forbid(unsafe_code)]

//! Client for the external download queue (MeTube).
//!
//! The dispatcher only sees the [`DownloadQueue`] trait so tests can swap in a
//! recording fake. [`MeTubeQueue`] is the production implementation: a single
//! `POST {base_url}/add` per URL, where anything other than HTTP 200 counts as
//! a rejected submission.

use std::{fmt, str::FromStr};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Audio container requested from the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
    Flac,
    M4a,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 4] = [Self::Mp3, Self::Wav, Self::Flac, Self::M4a];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Flac => "flac",
            Self::M4a => "m4a",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.as_str() == normalized)
            .ok_or_else(|| format!("unknown audio format: {value} (expected mp3, wav, flac or m4a)"))
    }
}

/// Body of a successful queue submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueResponse {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait DownloadQueue: Send + Sync {
    /// Asks the queue to download `url`. Any non-200 answer is an error.
    async fn submit(&self, url: &str, quality: &str, format: AudioFormat) -> Result<QueueResponse>;
}

#[derive(Serialize)]
struct AddRequest<'a> {
    url: &'a str,
    quality: &'a str,
    format: AudioFormat,
}

/// Blocking `ureq` client for MeTube's `/add` endpoint.
#[derive(Clone)]
pub struct MeTubeQueue {
    base_url: String,
    agent: ureq::Agent,
}

impl MeTubeQueue {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            return Err(Error::Configuration(
                "ME_TUBE_API_URL must point at the MeTube instance".into(),
            ));
        }
        Ok(Self {
            base_url,
            agent: ureq::Agent::new(),
        })
    }

    pub fn add_endpoint(&self) -> String {
        format!("{}/add", self.base_url)
    }
}

#[async_trait]
impl DownloadQueue for MeTubeQueue {
    async fn submit(&self, url: &str, quality: &str, format: AudioFormat) -> Result<QueueResponse> {
        let agent = self.agent.clone();
        let endpoint = self.add_endpoint();
        let url = url.to_owned();
        let quality = quality.to_owned();
        let url_for_error = url.clone();

        tokio::task::spawn_blocking(move || post_add(&agent, &endpoint, &url, &quality, format))
            .await
            .map_err(|err| Error::QueueTransport {
                url: url_for_error,
                message: err.to_string(),
            })?
    }
}

fn post_add(
    agent: &ureq::Agent,
    endpoint: &str,
    url: &str,
    quality: &str,
    format: AudioFormat,
) -> Result<QueueResponse> {
    let request = AddRequest {
        url,
        quality,
        format,
    };
    let result = agent
        .post(endpoint)
        .set("Content-Type", "application/json")
        .send_json(&request);

    match result {
        // ureq treats every status below 400 as success; the queue contract is
        // stricter.
        Ok(response) => {
            let status = response.status();
            let body = response.into_string().unwrap_or_default();
            if status != 200 {
                return Err(Error::QueueSubmission {
                    url: url.to_owned(),
                    status,
                    body,
                });
            }
            Ok(QueueResponse { status, body })
        }
        Err(ureq::Error::Status(status, response)) => Err(Error::QueueSubmission {
            url: url.to_owned(),
            status,
            body: response.into_string().unwrap_or_default(),
        }),
        Err(ureq::Error::Transport(transport)) => Err(Error::QueueTransport {
            url: url.to_owned(),
            message: transport.to_string(),
        }),
    }
}
