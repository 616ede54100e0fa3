#![forbid(unsafe_code)]

//! One-shot submission from the command line.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use musicapi_tools::{
    config::{RuntimeConfig, RuntimeOverrides, resolve_runtime_config},
    dispatcher::{DispatchOutcome, DispatchStatus, DownloadOptions},
    logging,
    queue::AudioFormat,
    submission::{Submission, SubmissionHandler},
    warning::get_warning,
};

#[derive(Debug, Parser)]
#[command(name = "submit", about = "Submit a song, album or channel URL")]
struct SubmitArgs {
    url: String,
    /// Flag a channel's artist for future auto-download refreshes.
    #[arg(long)]
    auto_download: bool,
    #[arg(long)]
    format: Option<AudioFormat>,
    #[arg(long)]
    quality: Option<String>,
    /// Record the URL without queueing a download.
    #[arg(long)]
    add_without_download: bool,
    /// Accept the youtube.com warning.
    #[arg(long, short = 'y')]
    yes: bool,
    #[arg(long)]
    env_file: Option<PathBuf>,
    #[arg(long)]
    db_path: Option<PathBuf>,
}

impl SubmitArgs {
    fn overrides(&self) -> RuntimeOverrides {
        RuntimeOverrides {
            env_path: self.env_file.clone(),
            db_path: self.db_path.clone(),
            ..RuntimeOverrides::default()
        }
    }

    /// Fails before any side effect when the URL carries a warning the user
    /// has not accepted.
    fn submission(&self, config: &RuntimeConfig) -> Result<Submission> {
        let url = self.url.trim();
        if url.is_empty() {
            bail!("url is required");
        }
        if let Some(warning) = get_warning(url)
            && !self.yes
        {
            bail!("{warning} Re-run with --yes to submit anyway.");
        }

        let defaults = config.default_options();
        Ok(Submission {
            url: url.to_owned(),
            auto_download: self.auto_download,
            options: DownloadOptions {
                quality: self.quality.clone().unwrap_or(defaults.quality),
                format: self.format.unwrap_or(defaults.format),
                add_without_download: self.add_without_download,
            },
        })
    }
}

fn describe(outcome: &DispatchOutcome) -> String {
    let status = match outcome.status {
        DispatchStatus::Queued => "queued",
        DispatchStatus::Recorded => "recorded",
        DispatchStatus::AlreadyQueued => "already queued",
    };
    let mut line = format!("{} {}: {status}", outcome.kind.as_str(), outcome.url);
    if !outcome.songs.is_empty() {
        line.push_str(&format!(" ({} songs)", outcome.songs.len()));
    }
    line
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = SubmitArgs::parse();
    let config = resolve_runtime_config(args.overrides()).context("loading configuration")?;
    let submission = args.submission(&config)?;

    let handler = SubmissionHandler::connect(&config)
        .await
        .context("initializing submission handler")?;
    let report = handler
        .handle(&submission)
        .await
        .with_context(|| format!("submitting {}", submission.url))?;

    println!("Successfully added: {}", submission.url);
    for outcome in &report.outcomes {
        println!("  {}", describe(outcome));
        for failure in &outcome.song_failures {
            println!("    song {} not recorded: {}", failure.url, failure.message);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use musicapi_tools::catalog::CatalogConfig;
    use musicapi_tools::url_kind::UrlKind;

    fn config() -> RuntimeConfig {
        RuntimeConfig {
            catalog: CatalogConfig::Local {
                path: PathBuf::from("/tmp/catalog.db"),
            },
            queue_url: "http://metube:8081".into(),
            listen_host: "127.0.0.1".into(),
            listen_port: 8080,
            www_root: None,
            yt_dlp: PathBuf::from("yt-dlp"),
            quality: "320".into(),
            format: AudioFormat::M4a,
        }
    }

    #[test]
    fn flags_override_configured_defaults() {
        let args = SubmitArgs::parse_from([
            "submit",
            "https://music.youtube.com/channel/UCabc",
            "--auto-download",
            "--format",
            "flac",
            "--add-without-download",
        ]);
        let submission = args.submission(&config()).unwrap();
        assert!(submission.auto_download);
        assert_eq!(submission.options.format, AudioFormat::Flac);
        assert_eq!(submission.options.quality, "320");
        assert!(submission.options.add_without_download);
    }

    #[test]
    fn plain_youtube_needs_yes() {
        let url = "https://www.youtube.com/watch?v=X";
        let err = SubmitArgs::parse_from(["submit", url])
            .submission(&config())
            .unwrap_err();
        assert!(err.to_string().contains("--yes"));

        let submission = SubmitArgs::parse_from(["submit", url, "--yes"])
            .submission(&config())
            .unwrap();
        assert_eq!(submission.options.format, AudioFormat::M4a);
    }

    #[test]
    fn unknown_format_is_rejected_by_parser() {
        let result = SubmitArgs::try_parse_from([
            "submit",
            "https://music.youtube.com/watch?v=X",
            "--format",
            "ogg",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn describe_mentions_song_count() {
        let outcome = DispatchOutcome {
            url: "https://music.youtube.com/playlist?list=PL1".into(),
            kind: UrlKind::Album,
            status: DispatchStatus::Queued,
            songs: vec!["a".into(), "b".into()],
            song_failures: Vec::new(),
        };
        assert_eq!(
            describe(&outcome),
            "album https://music.youtube.com/playlist?list=PL1: queued (2 songs)"
        );
    }
}
