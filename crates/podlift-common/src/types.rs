use std::fmt;

use serde::{Deserialize, Serialize};

use crate::image::ImageRef;

/// A credential value that never shows up in logs or debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns `None` for blank input.
    pub fn non_empty(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Registry identity. The username doubles as the image namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub secret: Option<Secret>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeStatus {
    pub installed: bool,
    pub running: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactState {
    Built,
    Failed,
}

/// Output of the build stage. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArtifact {
    image: ImageRef,
    state: ArtifactState,
}

impl BuildArtifact {
    pub fn built(image: ImageRef) -> Self {
        Self {
            image,
            state: ArtifactState::Built,
        }
    }

    pub fn failed(image: ImageRef) -> Self {
        Self {
            image,
            state: ArtifactState::Failed,
        }
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    pub fn reference(&self) -> String {
        self.image.reference()
    }

    pub fn state(&self) -> ArtifactState {
        self.state
    }

    pub fn is_built(&self) -> bool {
        self.state == ArtifactState::Built
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Pending,
    Ready,
    Failed,
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A remote endpoint created by the provisioner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub endpoint_id: String,
    pub endpoint_url: String,
    pub status: DeploymentStatus,
}
