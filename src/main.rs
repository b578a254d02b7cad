mod api;
mod config;
mod error;
mod pipeline;
mod publish;
mod scene;
mod video;
mod workspace;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use api::{TextClient, VideoClient};
use clap::Parser;
use config::{Config, Destination, FileConfig, Secrets};
use pipeline::{Pipeline, PipelineSettings, RunStatus};
use publish::{PublishingService, TikTokUploader, YouTubeUploader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use video::FfmpegConcatenator;

#[derive(Parser, Debug)]
#[command(name = "auto-shorts")]
#[command(about = "Generate a short video from a topic with AI and publish it", long_about = None)]
struct Args {
    /// Topic for the video
    #[arg(short, long)]
    topic: Option<String>,

    /// Read the topic from a file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Settings file
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Directory for per-run temporary files
    #[arg(short = 'w', long)]
    work_root: Option<PathBuf>,

    /// Directory for the final video
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Publish only to these platforms (repeatable), replacing the configured destinations
    #[arg(short, long = "platform")]
    platforms: Vec<String>,

    /// Video generation API key
    #[arg(long)]
    video_api_key: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    // 加载环境变量
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // 获取主题
    let topic = if let Some(topic) = args.topic {
        topic
    } else if let Some(file_path) = &args.file {
        tokio::fs::read_to_string(file_path)
            .await
            .with_context(|| format!("Failed to read topic file: {}", file_path.display()))?
    } else {
        eprintln!("Error: Either --topic or --file must be provided");
        std::process::exit(1);
    };
    let topic = topic.trim().to_string();
    if topic.is_empty() {
        eprintln!("Error: topic is empty");
        std::process::exit(1);
    }

    let mut file = FileConfig::load(&args.config)?;
    if let Some(work_root) = args.work_root {
        file.paths.work_root = work_root;
    }
    if let Some(output_dir) = args.output_dir {
        file.paths.output_dir = output_dir;
    }
    if !args.platforms.is_empty() {
        file.destinations = args
            .platforms
            .iter()
            .map(|p| Destination::for_platform(p))
            .collect();
    }

    let mut secrets = Secrets::from_env();
    if let Some(key) = args.video_api_key {
        secrets.video_api_key = Some(key);
    }

    let config = match Config::resolve(file, secrets) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    config.log_summary();

    let pipeline = build_pipeline(&config)?;

    info!("Starting auto-shorts generation...");
    match pipeline.run(&topic).await {
        Ok(report) => {
            for outcome in &report.published {
                match (&outcome.url, &outcome.error) {
                    (Some(url), _) => {
                        info!(platform = %outcome.platform, url = %url, "Published")
                    }
                    (None, Some(e)) => {
                        warn!(platform = %outcome.platform, error = %e, "Not published")
                    }
                    (None, None) => {}
                }
            }
            let video = report.final_video.display();
            match report.status {
                RunStatus::Success => info!(video = %video, "Run completed successfully"),
                RunStatus::PartialSuccess => {
                    warn!(video = %video, "Run completed with skipped items")
                }
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Err(e) => {
            error!(stage = %e.stage(), "Video generation failed: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn build_pipeline(config: &Config) -> anyhow::Result<Pipeline> {
    let text = TextClient::new(config.text.clone(), config.text_api_key.clone())
        .context("Failed to create text generation client")?;
    let video = VideoClient::new(config.video.clone(), config.video_api_key.clone())
        .context("Failed to create video generation client")?;
    let concatenator = FfmpegConcatenator::new(config.tools.ffmpeg.clone());

    let publisher = PublishingService::new()
        .with(Box::new(YouTubeUploader::new(
            config.youtube.api_base.clone(),
            config.youtube.privacy_status.clone(),
            config.youtube_access_token.clone(),
        )))
        .with(Box::new(TikTokUploader::new(
            config.tiktok.api_base.clone(),
            config.tiktok.privacy_level.clone(),
            config.tiktok_access_token.clone(),
        )));
    info!(platforms = ?publisher.platforms(), "Registered uploaders");

    let settings = PipelineSettings {
        work_root: config.paths.work_root.clone(),
        output_dir: config.paths.output_dir.clone(),
        output_format: config.video.output_format.clone(),
        fps: config.video.fps,
        destinations: config.destinations.clone(),
    };

    Ok(Pipeline::new(
        Arc::new(text),
        Arc::new(video),
        Arc::new(concatenator),
        publisher,
        settings,
    ))
}
