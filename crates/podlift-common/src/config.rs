use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::image::ImageRef;
use crate::types::Secret;

pub const DEFAULT_IMAGE_NAME: &str = "sesame-csm-1b-api";
pub const DEFAULT_ENDPOINT_NAME: &str = "sesame-csm-1b-tts";
pub const DEFAULT_GPU_TYPE: &str = "RTX 3090";
pub const DEFAULT_MIN_WORKERS: u32 = 0;
pub const DEFAULT_MAX_WORKERS: u32 = 5;
pub const DEFAULT_CONTAINER_DISK_GB: u32 = 25;
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MODEL_NAME: &str = "saishah/sesame-csm-1b";
pub const DEFAULT_DEVICE: &str = "cuda";

pub const DEFAULT_API_URL: &str = "https://rest.runpod.io/v1";
pub const DEFAULT_SERVERLESS_URL: &str = "https://api.runpod.ai/v2";
pub const CONSOLE_URL: &str = "https://www.runpod.io/console/serverless";

/// Read-only view of environment variables.
pub trait EnvSource: Send + Sync {
    /// Blank values are reported as unset.
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

/// In-memory environment, mostly for tests.
#[derive(Debug, Clone, Default)]
pub struct MapEnv(HashMap<String, String>);

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl EnvSource for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.0.get(key).filter(|v| !v.trim().is_empty()).cloned()
    }
}

/// Where and how the image is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub context: PathBuf,
    pub dockerfile: Option<PathBuf>,
    pub platform: Option<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            context: PathBuf::from("."),
            dockerfile: None,
            platform: None,
        }
    }
}

/// Everything needed to deploy except the registry identity, which is only
/// known once credentials have been resolved.
#[derive(Debug, Clone)]
pub struct DeploymentSettings {
    pub image_name: String,
    pub tag: Option<String>,
    pub endpoint_name: String,
    pub gpu_type: String,
    pub min_workers: u32,
    pub max_workers: u32,
    pub container_disk_gb: u32,
    pub port: u16,
    pub model_name: String,
    pub device: String,
    pub extra_env: BTreeMap<String, String>,
    pub build: BuildOptions,
    pub registry: Option<String>,
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        Self {
            image_name: DEFAULT_IMAGE_NAME.to_string(),
            tag: None,
            endpoint_name: DEFAULT_ENDPOINT_NAME.to_string(),
            gpu_type: DEFAULT_GPU_TYPE.to_string(),
            min_workers: DEFAULT_MIN_WORKERS,
            max_workers: DEFAULT_MAX_WORKERS,
            container_disk_gb: DEFAULT_CONTAINER_DISK_GB,
            port: DEFAULT_PORT,
            model_name: DEFAULT_MODEL_NAME.to_string(),
            device: DEFAULT_DEVICE.to_string(),
            extra_env: BTreeMap::new(),
            build: BuildOptions::default(),
            registry: None,
        }
    }
}

impl DeploymentSettings {
    /// Bind the settings to a registry namespace.
    pub fn resolve(&self, namespace: &str) -> Result<DeploymentConfig, ConfigError> {
        let image = ImageRef::new(namespace, &self.image_name, self.tag.as_deref())?
            .with_registry(self.registry.as_deref())?;

        if self.endpoint_name.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "endpoint name",
            });
        }
        if self.max_workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "MAX_WORKERS",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.min_workers > self.max_workers {
            return Err(ConfigError::InvalidValue {
                field: "MIN_WORKERS",
                reason: format!(
                    "{} exceeds the maximum of {}",
                    self.min_workers, self.max_workers
                ),
            });
        }
        if self.container_disk_gb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "CONTAINER_DISK",
                reason: "must be at least 1 GB".to_string(),
            });
        }

        let mut env = BTreeMap::new();
        env.insert("PORT".to_string(), self.port.to_string());
        env.insert("MODEL_NAME".to_string(), self.model_name.clone());
        env.insert("DEVICE".to_string(), self.device.clone());
        env.extend(self.extra_env.clone());

        Ok(DeploymentConfig {
            image,
            endpoint_name: self.endpoint_name.trim().to_string(),
            gpu_type: self.gpu_type.trim().to_string(),
            min_workers: self.min_workers,
            max_workers: self.max_workers,
            container_disk_gb: self.container_disk_gb,
            port: self.port,
            env,
            build: self.build.clone(),
        })
    }
}

/// Fully resolved deployment target. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentConfig {
    pub image: ImageRef,
    pub endpoint_name: String,
    pub gpu_type: String,
    pub min_workers: u32,
    pub max_workers: u32,
    pub container_disk_gb: u32,
    pub port: u16,
    /// Variables injected into the remote endpoint, sorted by name.
    pub env: BTreeMap<String, String>,
    pub build: BuildOptions,
}

/// Serverless platform API settings.
#[derive(Debug, Clone)]
pub struct PlatformSettings {
    pub api_key: Option<Secret>,
    pub api_url: String,
    pub serverless_url: String,
    pub console_url: String,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            serverless_url: DEFAULT_SERVERLESS_URL.to_string(),
            console_url: CONSOLE_URL.to_string(),
        }
    }
}
