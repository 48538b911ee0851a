use podlift_common::{BuildArtifact, BuildError, DeploymentConfig};

use crate::events::{EventSink, Reporter, Stage};
use crate::runtime::{BuildRequest, ContainerRuntime};

/// Builds the tagged image from the configured build context.
pub struct ImageBuilder<'a> {
    runtime: &'a dyn ContainerRuntime,
    report: Reporter<'a>,
}

impl<'a> ImageBuilder<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime, events: &'a dyn EventSink) -> Self {
        Self {
            runtime,
            report: Reporter::new(events, Stage::Build),
        }
    }

    /// Build once. A failing build is deterministic, so it is never retried.
    pub async fn build(&self, config: &DeploymentConfig) -> Result<BuildArtifact, BuildError> {
        let reference = config.image.reference();
        let request = BuildRequest {
            reference: reference.clone(),
            context: config.build.context.clone(),
            dockerfile: config.build.dockerfile.clone(),
            platform: config.build.platform.clone(),
        };

        self.report.info(format!(
            "Building {reference} from {} (this may take several minutes)",
            request.context.display()
        ));
        let output = self.runtime.build(&request).await?;

        if !output.success() {
            self.report.error(format!("Build of {reference} failed"));
            return Err(BuildError::Failed {
                reference,
                output: output.diagnostic(),
            });
        }

        self.report.success(format!("Built {reference}"));
        Ok(BuildArtifact::built(config.image.clone()))
    }
}
