//! Video assembly job binary.
//!
//! Logs go to stderr; the publication result is printed to stdout as JSON.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vcompose_job::{JobConfig, JobError, JobRunner};
use vcompose_models::JobRequest;

#[derive(Debug, Parser)]
#[command(name = "vcompose", version, about = "Compose a Drive clip with fixed assets and publish it")]
struct Cli {
    /// Drive share URL or bare file id of the main clip
    #[arg(long, env = "DRIVE_URL")]
    drive_url: String,

    /// Name of the uploaded file in the Drive output folder
    #[arg(long, env = "OUTPUT_NAME")]
    output_name: String,

    /// YouTube title; the YouTube upload is skipped when absent
    #[arg(long)]
    yt_title: Option<String>,

    #[arg(long, default_value = "")]
    yt_desc: String,

    /// Thumbnail image for the YouTube upload
    #[arg(long)]
    yt_thumb: Option<PathBuf>,

    /// Load environment from this file instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,
}

impl Cli {
    fn request(&self) -> JobRequest {
        let request = JobRequest::new(&self.drive_url, &self.output_name);
        match &self.yt_title {
            Some(title) => request.with_publish(title, &self.yt_desc, self.yt_thumb.clone()),
            None => request,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match &cli.env_file {
        Some(path) => {
            if let Err(e) = dotenvy::from_path(path) {
                eprintln!("Failed to load {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }

    init_tracing();

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error_kind = error_kind(&e), "Job failed: {:#}", e);
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

/// Run the job. `Ok(false)` means the artifact was produced but a sink failed.
async fn run(cli: &Cli) -> anyhow::Result<bool> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let config = JobConfig::from_env().context("Invalid configuration")?;
    let request = cli.request();
    info!(job_id = %request.job_id, "Starting vcompose job");

    let runner = JobRunner::from_config(config, &request)
        .await
        .context("Failed to initialize job")?;

    let report = tokio::select! {
        report = runner.run(&request) => report?,
        _ = tokio::signal::ctrl_c() => {
            // Dropping the job future kills ffmpeg and removes the job directory
            anyhow::bail!("Interrupted");
        }
    };

    println!("{}", report.result.to_json_pretty()?);

    for failure in &report.failures {
        warn!("{}", failure);
    }
    Ok(report.is_success())
}

/// Machine-readable kind of a failed run, from the first job error in the chain.
fn error_kind(err: &anyhow::Error) -> &'static str {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<JobError>())
        .map(JobError::kind)
        .unwrap_or("internal")
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("vcompose=info,vcompose_job=info,vcompose_media=info,aws_config=warn,hyper=warn")
    });

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_without_youtube() {
        let cli = Cli::try_parse_from([
            "vcompose",
            "--drive-url",
            "1a2B3c4D5e6F7g8H9i0JkLmNoP",
            "--output-name",
            "final.mp4",
        ])
        .unwrap();
        let request = cli.request();
        assert_eq!(request.output_name, "final.mp4");
        assert!(request.publish.is_none());
    }

    #[test]
    fn test_error_kind_through_context() {
        let err = anyhow::Error::new(JobError::asset_missing("outro.mp4", "/mnt/assets/outro.mp4"))
            .context("Failed to initialize job");
        assert_eq!(error_kind(&err), "asset_missing_or_empty");

        assert_eq!(error_kind(&anyhow::Error::new(JobError::Timeout(30))), "timeout");

        assert_eq!(error_kind(&anyhow::anyhow!("Interrupted")), "internal");
    }

    #[test]
    fn test_cli_with_youtube() {
        let cli = Cli::try_parse_from([
            "vcompose",
            "--drive-url",
            "https://drive.google.com/open?id=1a2B3c4D5e6F7g8H9i0JkLmNoP",
            "--output-name",
            "weekly.mp4",
            "--yt-title",
            "Weekly recap",
            "--yt-thumb",
            "thumb.jpg",
        ])
        .unwrap();
        let request = cli.request();
        let publish = request.publish.unwrap();
        assert_eq!(publish.title, "Weekly recap");
        assert_eq!(publish.description, "");
        assert_eq!(publish.thumbnail, Some(PathBuf::from("thumb.jpg")));
    }
}
