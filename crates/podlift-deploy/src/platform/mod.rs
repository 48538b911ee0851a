pub mod runpod;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use podlift_common::{BuildArtifact, DeploymentConfig, Secret};

pub use runpod::{RunpodClient, RunpodConnector};

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("platform API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected platform response: {0}")]
    Decode(String),
}

impl PlatformError {
    /// Worth another readiness check rather than giving up.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            Self::Decode(_) => false,
        }
    }
}

/// Serverless template: image plus container settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRequest {
    pub name: String,
    pub image_name: String,
    pub container_disk_in_gb: u32,
    pub env: BTreeMap<String, String>,
    pub ports: Vec<String>,
    pub is_serverless: bool,
}

impl TemplateRequest {
    pub fn new(artifact: &BuildArtifact, config: &DeploymentConfig) -> Self {
        Self {
            name: template_name(&config.endpoint_name, &artifact.reference()),
            image_name: artifact.reference(),
            container_disk_in_gb: config.container_disk_gb,
            env: config.env.clone(),
            ports: vec![format!("{}/http", config.port)],
            is_serverless: true,
        }
    }
}

/// Template names are unique on the platform. Deriving the name from the
/// endpoint and the image means a re-run finds the template it made before.
pub fn template_name(endpoint_name: &str, reference: &str) -> String {
    let image: String = reference
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '-',
        })
        .collect();
    format!("{endpoint_name}-{image}")
}

/// Serverless endpoint bound to a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointRequest {
    pub name: String,
    pub template_id: String,
    pub gpu_type_ids: Vec<String>,
    pub gpu_count: u32,
    pub workers_min: u32,
    pub workers_max: u32,
}

impl EndpointRequest {
    pub fn new(config: &DeploymentConfig, template_id: impl Into<String>) -> Self {
        Self {
            name: config.endpoint_name.clone(),
            template_id: template_id.into(),
            gpu_type_ids: gpu_type_ids(&config.gpu_type),
            gpu_count: 1,
            workers_min: config.min_workers,
            workers_max: config.max_workers,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorkerCounts {
    pub idle: u32,
    pub initializing: u32,
    pub ready: u32,
    pub running: u32,
    pub throttled: u32,
    pub unhealthy: u32,
}

/// Body of the endpoint health call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EndpointHealth {
    pub workers: WorkerCounts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointState {
    Initializing,
    Ready,
    Failed(String),
}

impl EndpointHealth {
    /// An endpoint allowed to scale to zero is ready once it answers health
    /// checks; otherwise `min_workers` healthy workers are required.
    pub fn state(&self, min_workers: u32) -> EndpointState {
        let w = &self.workers;
        let healthy = w.idle.saturating_add(w.ready).saturating_add(w.running);
        if w.unhealthy > 0 && healthy == 0 && w.initializing == 0 {
            return EndpointState::Failed(format!("{} unhealthy workers", w.unhealthy));
        }
        if healthy >= min_workers {
            EndpointState::Ready
        } else {
            EndpointState::Initializing
        }
    }
}

/// A template or endpoint as listed by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedResource {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Id of the newest resource called `name`. Older duplicates are left alone.
pub fn newest_named(resources: Vec<NamedResource>, name: &str) -> Option<String> {
    resources
        .into_iter()
        .filter(|r| r.name == name)
        .max_by_key(|r| r.created_at)
        .map(|r| r.id)
}

#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Id of the caller's template called `name`, if any.
    async fn find_template(&self, name: &str) -> Result<Option<String>, PlatformError>;

    /// Returns the new template id.
    async fn create_template(&self, request: &TemplateRequest) -> Result<String, PlatformError>;

    async fn update_template(
        &self,
        template_id: &str,
        request: &TemplateRequest,
    ) -> Result<(), PlatformError>;

    /// Id of the caller's endpoint called `name`, if any.
    async fn find_endpoint(&self, name: &str) -> Result<Option<String>, PlatformError>;

    /// Returns the new endpoint id.
    async fn create_endpoint(&self, request: &EndpointRequest) -> Result<String, PlatformError>;

    async fn update_endpoint(
        &self,
        endpoint_id: &str,
        request: &EndpointRequest,
    ) -> Result<(), PlatformError>;

    async fn endpoint_health(&self, endpoint_id: &str) -> Result<EndpointHealth, PlatformError>;

    /// Public invocation URL of an endpoint.
    fn endpoint_url(&self, endpoint_id: &str) -> String;
}

/// Builds an API client once an API key is known.
pub trait PlatformConnector: Send + Sync {
    fn connect(&self, api_key: &Secret) -> Result<Box<dyn PlatformApi>, PlatformError>;
}

const GPU_TYPES: &[(&str, &str)] = &[
    ("rtx 3090", "NVIDIA GeForce RTX 3090"),
    ("rtx 4090", "NVIDIA GeForce RTX 4090"),
    ("rtx a4000", "NVIDIA RTX A4000"),
    ("rtx a4500", "NVIDIA RTX A4500"),
    ("rtx a5000", "NVIDIA RTX A5000"),
    ("rtx a6000", "NVIDIA RTX A6000"),
    ("a40", "NVIDIA A40"),
    ("a100", "NVIDIA A100 80GB PCIe"),
    ("a100 sxm", "NVIDIA A100-SXM4-80GB"),
    ("l4", "NVIDIA L4"),
    ("l40", "NVIDIA L40"),
    ("l40s", "NVIDIA L40S"),
    ("h100", "NVIDIA H100 80GB HBM3"),
];

/// Map a GPU class such as `RTX 3090` (or a list like `RTX 3090, A100` /
/// `RTX 3090 or A100`) to platform GPU type ids. Unknown names pass through.
pub fn gpu_type_ids(gpu_class: &str) -> Vec<String> {
    gpu_class
        .split(',')
        .flat_map(|part| part.split(" or "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|name| {
            let key = name.to_ascii_lowercase();
            GPU_TYPES
                .iter()
                .find(|(alias, _)| *alias == key)
                .map(|(_, id)| id.to_string())
                .unwrap_or_else(|| name.to_string())
        })
        .collect()
}
