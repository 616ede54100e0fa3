#![forbid(unsafe_code)]

//! Error type shared by every library module.
//!
//! Binaries wrap these in `anyhow` for reporting; the library keeps the
//! variants apart so callers can tell a duplicate from a failure and a bad
//! URL from a broken queue.

/// Everything that can go wrong while classifying, expanding or dispatching a
/// submission.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unsupported URL format: {0}")]
    UnsupportedUrl(String),

    #[error("Malformed URL {url}: {reason}")]
    MalformedUrl { url: String, reason: String },

    #[error("Queue rejected {url} with status {status}: {body}")]
    QueueSubmission {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Queue unreachable while submitting {url}: {message}")]
    QueueTransport { url: String, message: String },

    #[error("Metadata lookup failed: {0}")]
    Metadata(String),

    #[error("Error queuing download for album {album_url}: {source}")]
    ChannelAlbum {
        album_url: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Catalog storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<libsql::Error> for Error {
    fn from(err: libsql::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl Error {
    pub(crate) fn malformed(url: &str, reason: impl Into<String>) -> Self {
        Self::MalformedUrl {
            url: url.to_owned(),
            reason: reason.into(),
        }
    }

    /// True when the submitted URL itself is at fault rather than a
    /// collaborator.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::UnsupportedUrl(_) | Self::MalformedUrl { .. } => true,
            Self::ChannelAlbum { source, .. } => source.is_client_error(),
            _ => false,
        }
    }

    /// True when an upstream service (queue or metadata source) failed.
    pub fn is_upstream_error(&self) -> bool {
        match self {
            Self::QueueSubmission { .. } | Self::QueueTransport { .. } | Self::Metadata(_) => true,
            Self::ChannelAlbum { source, .. } => source.is_upstream_error(),
            _ => false,
        }
    }
}
