use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use podlift_common::{PlatformSettings, Secret};

use super::{
    newest_named, EndpointHealth, EndpointRequest, NamedResource, PlatformApi, PlatformConnector,
    PlatformError, TemplateRequest,
};

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

/// Template fields that may change between deployments of the same image.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TemplateUpdate<'a> {
    image_name: &'a str,
    container_disk_in_gb: u32,
    env: &'a std::collections::BTreeMap<String, String>,
    ports: &'a [String],
}

impl<'a> From<&'a TemplateRequest> for TemplateUpdate<'a> {
    fn from(r: &'a TemplateRequest) -> Self {
        Self {
            image_name: &r.image_name,
            container_disk_in_gb: r.container_disk_in_gb,
            env: &r.env,
            ports: &r.ports,
        }
    }
}

/// RunPod REST client for templates, endpoints and endpoint health.
///
/// Listing, creation and updates go to the REST API; health and invocation
/// live under the serverless URL.
pub struct RunpodClient {
    http: reqwest::Client,
    api_url: String,
    serverless_url: String,
    api_key: Secret,
}

impl RunpodClient {
    pub fn new(
        api_url: impl Into<String>,
        serverless_url: impl Into<String>,
        api_key: Secret,
    ) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            serverless_url: serverless_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn create<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<String, PlatformError> {
        let url = format!("{}/{path}", self.api_url);
        tracing::debug!(%url, "platform create");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .json(body)
            .send()
            .await?;
        let created: Created = decode(resp).await?;
        Ok(created.id)
    }

    async fn update<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<(), PlatformError> {
        let url = format!("{}/{path}", self.api_url);
        tracing::debug!(%url, "platform update");
        let resp = self
            .http
            .patch(&url)
            .bearer_auth(self.api_key.expose())
            .json(body)
            .send()
            .await?;
        check(resp).await.map(drop)
    }

    async fn list(&self, path: &str) -> Result<Vec<NamedResource>, PlatformError> {
        let url = format!("{}/{path}", self.api_url);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(self.api_key.expose())
            .send()
            .await?;
        decode(resp).await
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, PlatformError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(PlatformError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, PlatformError> {
    check(resp)
        .await?
        .json::<T>()
        .await
        .map_err(|e| PlatformError::Decode(e.to_string()))
}

#[async_trait]
impl PlatformApi for RunpodClient {
    async fn find_template(&self, name: &str) -> Result<Option<String>, PlatformError> {
        Ok(newest_named(self.list("templates").await?, name))
    }

    async fn create_template(&self, request: &TemplateRequest) -> Result<String, PlatformError> {
        self.create("templates", request).await
    }

    async fn update_template(
        &self,
        template_id: &str,
        request: &TemplateRequest,
    ) -> Result<(), PlatformError> {
        self.update(&format!("templates/{template_id}"), &TemplateUpdate::from(request))
            .await
    }

    async fn find_endpoint(&self, name: &str) -> Result<Option<String>, PlatformError> {
        Ok(newest_named(self.list("endpoints").await?, name))
    }

    async fn create_endpoint(&self, request: &EndpointRequest) -> Result<String, PlatformError> {
        self.create("endpoints", request).await
    }

    async fn update_endpoint(
        &self,
        endpoint_id: &str,
        request: &EndpointRequest,
    ) -> Result<(), PlatformError> {
        self.update(&format!("endpoints/{endpoint_id}"), request).await
    }

    async fn endpoint_health(&self, endpoint_id: &str) -> Result<EndpointHealth, PlatformError> {
        let url = format!("{}/{endpoint_id}/health", self.serverless_url);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(self.api_key.expose())
            .send()
            .await?;
        decode(resp).await
    }

    fn endpoint_url(&self, endpoint_id: &str) -> String {
        format!("{}/{endpoint_id}", self.serverless_url)
    }
}

#[derive(Debug, Clone)]
pub struct RunpodConnector {
    api_url: String,
    serverless_url: String,
}

impl RunpodConnector {
    pub fn new(api_url: impl Into<String>, serverless_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            serverless_url: serverless_url.into(),
        }
    }

    pub fn from_settings(settings: &PlatformSettings) -> Self {
        Self::new(&settings.api_url, &settings.serverless_url)
    }
}

impl PlatformConnector for RunpodConnector {
    fn connect(&self, api_key: &Secret) -> Result<Box<dyn PlatformApi>, PlatformError> {
        let client = RunpodClient::new(&self.api_url, &self.serverless_url, api_key.clone())?;
        Ok(Box::new(client))
    }
}
