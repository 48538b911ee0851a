use podlift_common::{
    BuildArtifact, DeploymentConfig, DeploymentResult, DeploymentStatus, ProvisionError, Secret,
};

use crate::events::{EventSink, Reporter, Stage};
use crate::platform::{
    EndpointRequest, EndpointState, PlatformApi, PlatformConnector, TemplateRequest,
};
use crate::retry::{poll_until, PollOutcome, PollPolicy, Sleeper};

/// Creates or updates the serverless template and endpoint for a pushed
/// image and waits for the endpoint to report healthy workers.
pub struct EndpointProvisioner<'a> {
    connector: &'a dyn PlatformConnector,
    sleeper: &'a dyn Sleeper,
    report: Reporter<'a>,
    policy: PollPolicy,
}

impl<'a> EndpointProvisioner<'a> {
    pub fn new(
        connector: &'a dyn PlatformConnector,
        sleeper: &'a dyn Sleeper,
        events: &'a dyn EventSink,
    ) -> Self {
        Self {
            connector,
            sleeper,
            report: Reporter::new(events, Stage::Provision),
            policy: PollPolicy::endpoint_ready(),
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// A missing key is `Unavailable` and no request is made. Template and
    /// endpoint are looked up by name first, so re-running updates what an
    /// earlier run created. Requests are never retried.
    ///
    /// Errors are only returned while no endpoint exists. Once one does, the
    /// result always carries its id: `Pending` when the budget runs out,
    /// `Failed` when its workers are unhealthy or health checks are refused.
    pub async fn provision(
        &self,
        artifact: &BuildArtifact,
        config: &DeploymentConfig,
        api_key: Option<&Secret>,
    ) -> Result<DeploymentResult, ProvisionError> {
        let Some(api_key) = api_key else {
            self.report
                .info("RUNPOD_API_KEY not set; skipping automatic endpoint creation");
            return Err(ProvisionError::Unavailable);
        };

        let api = self.connector.connect(api_key).map_err(|e| self.fail(e))?;

        let template = TemplateRequest::new(artifact, config);
        let template_id = match api.find_template(&template.name).await.map_err(|e| self.fail(e))? {
            Some(id) => {
                self.report
                    .info(format!("Updating template {} ({id}) to {}", template.name, template.image_name));
                api.update_template(&id, &template)
                    .await
                    .map_err(|e| self.fail(e))?;
                id
            }
            None => {
                self.report
                    .info(format!("Creating template {} for {}", template.name, template.image_name));
                api.create_template(&template)
                    .await
                    .map_err(|e| self.fail(e))?
            }
        };
        tracing::debug!(%template_id, "template ready");

        let request = EndpointRequest::new(config, template_id);
        let gpus = request.gpu_type_ids.join(", ");
        let endpoint_id = match api.find_endpoint(&request.name).await.map_err(|e| self.fail(e))? {
            Some(id) => {
                self.report
                    .info(format!("Updating endpoint {} ({id}) on {gpus}", request.name));
                api.update_endpoint(&id, &request)
                    .await
                    .map_err(|e| self.fail(e))?;
                self.report.success(format!("Endpoint {id} updated"));
                id
            }
            None => {
                self.report
                    .info(format!("Creating endpoint {} on {gpus}", request.name));
                let id = api
                    .create_endpoint(&request)
                    .await
                    .map_err(|e| self.fail(e))?;
                self.report.success(format!("Endpoint {id} created"));
                id
            }
        };
        let endpoint_url = api.endpoint_url(&endpoint_id);

        let status = self
            .wait_ready(api.as_ref(), &endpoint_id, config.min_workers)
            .await;
        match status {
            DeploymentStatus::Ready => self.report.success(format!("Endpoint ready at {endpoint_url}")),
            DeploymentStatus::Pending => self.report.warn(format!(
                "Endpoint {endpoint_id} is still initializing; check the console for progress"
            )),
            DeploymentStatus::Failed => {}
        }

        Ok(DeploymentResult {
            endpoint_id,
            endpoint_url,
            status,
        })
    }

    async fn wait_ready(
        &self,
        api: &dyn PlatformApi,
        endpoint_id: &str,
        min_workers: u32,
    ) -> DeploymentStatus {
        let outcome = poll_until(self.policy, self.sleeper, |attempt| async move {
            match api.endpoint_health(endpoint_id).await {
                Ok(health) => match health.state(min_workers) {
                    EndpointState::Ready => Ok(Some(())),
                    EndpointState::Initializing => Ok(None),
                    EndpointState::Failed(reason) => Err(reason),
                },
                Err(e) if e.is_transient() => {
                    tracing::debug!(attempt, error = %e, "health check failed");
                    Ok(None)
                }
                Err(e) => Err(e.to_string()),
            }
        })
        .await;

        match outcome {
            Ok(PollOutcome::Ready { .. }) => DeploymentStatus::Ready,
            Ok(PollOutcome::Exhausted { .. }) => DeploymentStatus::Pending,
            Err(reason) => {
                tracing::warn!(endpoint_id, %reason, "endpoint failed");
                self.report
                    .error(format!("Endpoint {endpoint_id} failed: {reason}"));
                DeploymentStatus::Failed
            }
        }
    }

    fn fail(&self, err: impl ToString) -> ProvisionError {
        let err = ProvisionError::failed(err);
        self.report.error(err.to_string());
        err
    }
}
