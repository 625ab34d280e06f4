use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use veo_bridge::config::Config;
use veo_bridge::generator::{run_generation, run_resume};
use veo_bridge::init;
use veo_bridge::materialize::list_saved_videos;
use veo_bridge::request::{AspectRatio, GenerationRequest, SourceImage};

#[derive(Parser)]
#[command(name = "veo-cli", about = "Generate a video with Veo and save it locally")]
struct Cli {
    /// Text prompt; may be omitted with --image.
    prompt: Vec<String>,

    #[arg(long, short, default_value = "config.json", env = "VEO_CONFIG")]
    config: PathBuf,

    /// Animate this PNG/JPEG instead of generating from text only.
    #[arg(long)]
    image: Option<PathBuf>,

    #[arg(long, short)]
    duration: Option<u32>,

    #[arg(long, default_value = "16:9")]
    aspect_ratio: String,

    /// Overrides the configured model.
    #[arg(long)]
    model: Option<String>,

    /// Keep polling an operation submitted earlier.
    #[arg(long, value_name = "OPERATION")]
    resume: Option<String>,

    /// List videos in the output directory and exit.
    #[arg(long)]
    list: bool,

    #[arg(long)]
    open: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "veo_bridge=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::load_or_env(&cli.config).await?;
    if let Some(model) = &cli.model {
        if cli.image.is_some() {
            config.image_model_id = model.clone();
        } else {
            config.model_id = model.clone();
        }
    }
    config.open_after_save |= cli.open;

    if cli.list {
        let videos = list_saved_videos(&config.output_dir)?;
        if videos.is_empty() {
            println!("No videos in {}", config.output_dir.display());
        }
        for video in videos {
            let prompt = video
                .metadata
                .as_ref()
                .map(|m| m.prompt.as_str())
                .unwrap_or("-");
            println!(
                "{}  {:.2} MB  {}",
                video.path.display(),
                video.size_bytes as f64 / (1024.0 * 1024.0),
                prompt
            );
        }
        return Ok(());
    }

    init::ensure_output_dir(&config.output_dir).await?;
    if !init::check_gcloud(&config.gcloud_binary).await {
        eprintln!("[WARNING] gcloud not found in PATH; relying on other credential sources.");
    }

    let prompt = cli.prompt.join(" ");
    let code = match &cli.resume {
        Some(operation) => run_resume(&config, operation, &prompt).await?,
        None => {
            let mut request = match &cli.image {
                Some(path) => {
                    GenerationRequest::image(&prompt, SourceImage::from_path(path).await?)
                }
                None => GenerationRequest::text(&prompt),
            }
            .with_aspect_ratio(cli.aspect_ratio.parse::<AspectRatio>()?);
            if let Some(duration) = cli.duration {
                request = request.with_duration(duration);
            }
            run_generation(&config, request).await?
        }
    };
    std::process::exit(code);
}
