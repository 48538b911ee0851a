use podlift_common::{BuildArtifact, PublishError};

use crate::credentials::Session;
use crate::events::{EventSink, Reporter, Stage};
use crate::runtime::ContainerRuntime;

/// Pushes a built image to the registry the session is logged into.
pub struct ImagePublisher<'a> {
    runtime: &'a dyn ContainerRuntime,
    report: Reporter<'a>,
}

impl<'a> ImagePublisher<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime, events: &'a dyn EventSink) -> Self {
        Self {
            runtime,
            report: Reporter::new(events, Stage::Publish),
        }
    }

    /// Push once. Re-running the whole pipeline is the recovery path.
    pub async fn publish(
        &self,
        session: &Session,
        artifact: &BuildArtifact,
    ) -> Result<(), PublishError> {
        let reference = artifact.reference();
        if !artifact.is_built() {
            return Err(PublishError::NotBuilt { reference });
        }
        if session.registry() != artifact.image().registry() {
            return Err(PublishError::WrongRegistry {
                reference,
                session: session.registry().unwrap_or("Docker Hub").to_string(),
            });
        }

        tracing::debug!(username = session.username(), image = %reference, "pushing");
        self.report.info(format!(
            "Pushing {reference} (this may take several minutes)"
        ));
        let output = self.runtime.push(&reference).await?;

        if !output.success() {
            self.report.error(format!("Push of {reference} failed"));
            return Err(PublishError::Failed {
                reference,
                output: output.diagnostic(),
            });
        }

        self.report.success(format!("Pushed {reference}"));
        Ok(())
    }
}
