use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use podlift_common::config::{
    DEFAULT_API_URL, DEFAULT_CONTAINER_DISK_GB, DEFAULT_DEVICE, DEFAULT_ENDPOINT_NAME,
    DEFAULT_GPU_TYPE, DEFAULT_IMAGE_NAME, DEFAULT_MAX_WORKERS, DEFAULT_MIN_WORKERS,
    DEFAULT_MODEL_NAME, DEFAULT_PORT, DEFAULT_SERVERLESS_URL,
};
use podlift_deploy::retry::{ENDPOINT_READY_ATTEMPTS, POLL_INTERVAL_SECS};

#[derive(Debug, Parser)]
#[command(name = "podlift")]
#[command(
    about = "Build and push the TTS API image, then deploy it as a RunPod serverless endpoint",
    long_about = None
)]
pub struct Args {
    /// Log line format (logs go to stderr; filter with RUST_LOG)
    #[arg(long, value_enum, default_value_t = LogFormatArg::Text, global = true)]
    pub log_format: LogFormatArg,

    /// OTLP/HTTP endpoint for exporting traces
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT", global = true)]
    pub otlp_endpoint: Option<String>,

    /// Bearer token for the OTLP endpoint
    #[arg(long, env = "OTEL_EXPORTER_OTLP_TOKEN", hide_env_values = true, global = true)]
    pub otlp_token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check Docker, log in, build, push and provision the endpoint
    Deploy(DeployArgs),
    /// Print the manual endpoint setup checklist without touching Docker
    Instructions(TargetArgs),
}

/// What is deployed and how the endpoint is sized.
#[derive(Debug, clap::Args)]
pub struct TargetArgs {
    /// Docker Hub username, also the image namespace (falls back to
    /// DOCKERHUB_USERNAME, then a prompt)
    pub username: Option<String>,

    /// Image tag [default: latest]
    #[arg(env = "IMAGE_TAG")]
    pub tag: Option<String>,

    /// Image name without namespace
    #[arg(long, env = "IMAGE_NAME", default_value = DEFAULT_IMAGE_NAME)]
    pub image_name: String,

    /// Registry host such as ghcr.io; Docker Hub when omitted
    #[arg(long, env = "DOCKER_REGISTRY")]
    pub registry: Option<String>,

    /// Serverless endpoint name
    #[arg(long, env = "ENDPOINT_NAME", default_value = DEFAULT_ENDPOINT_NAME)]
    pub endpoint_name: String,

    /// GPU class, e.g. "RTX 3090" or "RTX 3090, A100"
    #[arg(long, env = "GPU_TYPE", default_value = DEFAULT_GPU_TYPE)]
    pub gpu_type: String,

    #[arg(long, env = "MIN_WORKERS", default_value_t = DEFAULT_MIN_WORKERS)]
    pub min_workers: u32,

    #[arg(long, env = "MAX_WORKERS", default_value_t = DEFAULT_MAX_WORKERS)]
    pub max_workers: u32,

    /// Container disk in GB
    #[arg(long, env = "CONTAINER_DISK", default_value_t = DEFAULT_CONTAINER_DISK_GB)]
    pub container_disk: u32,

    /// Port the API listens on inside the container
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Model the API loads at startup
    #[arg(long, env = "MODEL_NAME", default_value = DEFAULT_MODEL_NAME)]
    pub model_name: String,

    /// Inference device inside the container
    #[arg(long, env = "DEVICE", default_value = DEFAULT_DEVICE)]
    pub device: String,

    /// Extra endpoint environment variable (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub env: Vec<(String, String)>,
}

#[derive(Debug, clap::Args)]
pub struct DeployArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Build context directory
    #[arg(long)]
    pub context: Option<PathBuf>,

    /// Dockerfile path
    #[arg(long = "file", short = 'f')]
    pub dockerfile: Option<PathBuf>,

    /// Target platform passed to `docker build`, e.g. linux/amd64
    #[arg(long)]
    pub platform: Option<String>,

    /// Never prompt; unanswered questions are declined unless --yes is given
    #[arg(long, env = "PODLIFT_NON_INTERACTIVE")]
    pub non_interactive: bool,

    /// Answer yes to confirmations (e.g. installing Docker)
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Skip the platform API and print manual setup instructions
    #[arg(long)]
    pub skip_provision: bool,

    /// Endpoint readiness checks before reporting the endpoint as pending
    #[arg(long, default_value_t = ENDPOINT_READY_ATTEMPTS)]
    pub poll_attempts: u32,

    /// Seconds between status checks
    #[arg(long, default_value_t = POLL_INTERVAL_SECS)]
    pub poll_interval_secs: u64,

    /// Platform API key; without it the endpoint is set up by hand
    #[arg(long, env = "RUNPOD_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Platform REST API base URL
    #[arg(long, env = "RUNPOD_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Serverless invocation base URL
    #[arg(long, env = "RUNPOD_SERVERLESS_URL", default_value = DEFAULT_SERVERLESS_URL)]
    pub serverless_url: String,

    /// Docker executable
    #[arg(long, env = "PODLIFT_DOCKER", default_value = "docker")]
    pub docker: String,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty variable name in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
