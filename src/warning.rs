#![forbid(unsafe_code)]

//! Advisories shown before a submission is accepted.

pub const PLAIN_YOUTUBE_WARNING: &str =
    "Using youtube.com links instead of music.youtube.com links is discouraged.";

/// Non-blocking advisory for discouraged URL shapes. Callers must ask the
/// user to confirm before continuing when this returns `Some`.
pub fn get_warning(url: &str) -> Option<&'static str> {
    if url.contains("youtube.com") && !url.contains("music.youtube.com") {
        Some(PLAIN_YOUTUBE_WARNING)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_youtube_links_are_discouraged() {
        let warning = get_warning("https://youtube.com/watch?v=X").expect("warning");
        assert!(warning.contains("music.youtube.com"));
        assert!(get_warning("https://www.youtube.com/playlist?list=PL1").is_some());
    }

    #[test]
    fn music_links_and_other_hosts_pass() {
        assert!(get_warning("https://music.youtube.com/watch?v=X").is_none());
        assert!(get_warning("https://example.com/watch?v=X").is_none());
    }
}
