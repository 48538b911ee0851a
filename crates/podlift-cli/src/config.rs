use podlift_common::{BuildOptions, DeploymentSettings, PlatformSettings, Secret};

use crate::args::{DeployArgs, TargetArgs};

/// Flags win over environment variables, which win over defaults; clap has
/// already applied that order.
pub fn build_settings(target: &TargetArgs, deploy: Option<&DeployArgs>) -> DeploymentSettings {
    let mut build = BuildOptions::default();
    if let Some(d) = deploy {
        if let Some(context) = &d.context {
            build.context = context.clone();
        }
        build.dockerfile = d.dockerfile.clone();
        build.platform = d.platform.clone();
    }

    DeploymentSettings {
        image_name: target.image_name.clone(),
        tag: target.tag.clone(),
        endpoint_name: target.endpoint_name.clone(),
        gpu_type: target.gpu_type.clone(),
        min_workers: target.min_workers,
        max_workers: target.max_workers,
        container_disk_gb: target.container_disk,
        port: target.port,
        model_name: target.model_name.clone(),
        device: target.device.clone(),
        extra_env: target.env.iter().cloned().collect(),
        build,
        registry: target.registry.clone(),
    }
}

pub fn build_platform(deploy: &DeployArgs) -> PlatformSettings {
    PlatformSettings {
        api_key: deploy.api_key.as_deref().and_then(Secret::non_empty),
        api_url: deploy.api_url.clone(),
        serverless_url: deploy.serverless_url.clone(),
        ..Default::default()
    }
}
