use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::{fs, process::Command};

use novelize_core::{
    ChunkProgress, FileProgressSink, PipelineConfig, ProgressSink, Provider, pipeline,
};

// tiny variant: transcription latency matters more than accuracy here
const MODEL_NAME: &str = "ggml-tiny.bin";

/// CLI wrapper for Provider enum (needed for clap ValueEnum)
#[derive(Clone, Default, ValueEnum)]
enum CliProvider {
    #[default]
    Grok,
    Openai,
    Gemini,
}

impl From<CliProvider> for Provider {
    fn from(cli: CliProvider) -> Self {
        match cli {
            CliProvider::Grok => Provider::Grok,
            CliProvider::Openai => Provider::Openai,
            CliProvider::Gemini => Provider::Gemini,
        }
    }
}

#[derive(Parser)]
#[command(name = "novelize")]
#[command(about = "Convert a video file into a flowing prose narrative")]
struct Cli {
    /// Path to the input video file
    video_path: PathBuf,

    /// Output file path. Defaults to `<video stem>_narrative.txt`.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Sample one frame every N seconds
    #[arg(long, default_value_t = 10)]
    frame_interval: u32,

    /// AI provider for frame captions and narrative synthesis
    #[arg(short, long, default_value = "grok")]
    provider: CliProvider,

    /// Path to a ggml Whisper model. Downloaded to the cache dir if omitted.
    #[arg(long)]
    whisper_model: Option<PathBuf>,
}

fn default_model_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("novelize")
        .join("models")
        .join(MODEL_NAME)
}

/// Download the Whisper model into the cache if it is not there yet.
async fn ensure_model(model_path: &Path) -> Result<()> {
    if model_path.exists() {
        return Ok(());
    }
    let download_url = format!(
        "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/{}",
        MODEL_NAME
    );
    if let Some(parent) = model_path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let output = Command::new("curl")
        .arg("-L")
        .arg(&download_url)
        .arg("-o")
        .arg(model_path)
        .output()
        .await?;

    if !output.status.success() {
        anyhow::bail!(
            "model download from {download_url} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(())
}

/// Mirrors every report onto the terminal bar and the durable progress file.
struct CliProgressSink {
    bar: ProgressBar,
    file: FileProgressSink,
}

impl ProgressSink for CliProgressSink {
    fn report(&self, status: &str, percent: u32, status_index: u32, chunk: ChunkProgress) {
        self.bar.set_position(percent as u64);
        if chunk.total > 1 {
            self.bar
                .set_message(format!("{status} ({}/{})", chunk.current, chunk.total));
        } else {
            self.bar.set_message(status.to_string());
        }
        self.file.report(status, percent, status_index, chunk);
    }
}

fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos:>3}% {wide_msg}")
            .unwrap(),
    );
    pb
}

extern "C" fn whisper_log_callback(
    _level: u32,
    _message: *const std::ffi::c_char,
    _user_data: *mut std::ffi::c_void,
) {
    // silent
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let provider: Provider = cli.provider.into();

    unsafe {
        whisper_rs::set_log_callback(Some(whisper_log_callback), std::ptr::null_mut());
    }

    // Validate API key early
    if let Err(e) = provider.validate_api_key() {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    if !cli.video_path.exists() {
        eprintln!(
            "{} Video file not found: {}",
            style("Error:").red().bold(),
            cli.video_path.display()
        );
        std::process::exit(1);
    }

    let output_path = cli.output.unwrap_or_else(|| {
        let stem = cli
            .video_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        PathBuf::from(format!("{stem}_narrative.txt"))
    });

    println!(
        "\n{}  {}\n",
        style("novelize").cyan().bold(),
        style("Video to Narrative").dim()
    );

    let whisper_model = cli.whisper_model.unwrap_or_else(default_model_path);
    println!("{} Checking model...", style("✓").green().bold());
    ensure_model(&whisper_model).await?;

    println!("{}", style("─".repeat(60)).dim());

    let mut config = PipelineConfig::new(whisper_model);
    config.frame_interval = cli.frame_interval;

    let bar = create_progress_bar();
    let sink = Arc::new(CliProgressSink {
        bar: bar.clone(),
        file: FileProgressSink::for_output(&output_path),
    });

    match pipeline::run(&cli.video_path, &output_path, &provider, &config, sink).await {
        Ok(()) => {
            bar.finish_with_message("Completed");
            println!(
                "\n{} {}\n",
                style("Saved:").dim(),
                style(output_path.display()).cyan()
            );
            Ok(())
        }
        Err(e) => {
            bar.abandon();
            eprintln!("\n{} {}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    }
}
