use std::fmt::{self, Write as _};

use podlift_common::{BuildArtifact, DeploymentConfig};

/// Rendered manual setup checklist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionText(String);

impl InstructionText {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstructionText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turns a published artifact and its configuration into manual steps that
/// reach the same endpoint the provisioner would have created.
pub trait InstructionPresenter: Send + Sync {
    fn render(&self, artifact: &BuildArtifact, config: &DeploymentConfig) -> InstructionText;
}

/// Numbered checklist for the platform web console.
#[derive(Debug, Clone)]
pub struct ChecklistPresenter {
    console_url: String,
}

impl ChecklistPresenter {
    pub fn new(console_url: impl Into<String>) -> Self {
        Self {
            console_url: console_url.into(),
        }
    }
}

impl Default for ChecklistPresenter {
    fn default() -> Self {
        Self::new(podlift_common::config::CONSOLE_URL)
    }
}

impl InstructionPresenter for ChecklistPresenter {
    fn render(&self, artifact: &BuildArtifact, config: &DeploymentConfig) -> InstructionText {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = write_checklist(&mut out, &self.console_url, artifact, config);
        InstructionText(out)
    }
}

fn write_checklist(
    out: &mut String,
    console_url: &str,
    artifact: &BuildArtifact,
    config: &DeploymentConfig,
) -> fmt::Result {
    writeln!(out, "1. Open {console_url}")?;
    writeln!(out, "2. Click \"New Endpoint\"")?;
    writeln!(out, "3. Use these settings:")?;
    writeln!(out, "   Container image:  {}", artifact.reference())?;
    writeln!(out, "   Endpoint name:    {}", config.endpoint_name)?;
    writeln!(out, "   GPU type:         {}", config.gpu_type)?;
    writeln!(out, "   Container disk:   {}GB", config.container_disk_gb)?;
    writeln!(out, "   Min workers:      {}", config.min_workers)?;
    writeln!(out, "   Max workers:      {}", config.max_workers)?;
    writeln!(out, "   Exposed port:     {}/http", config.port)?;
    writeln!(out, "4. Add environment variables:")?;
    for (key, value) in &config.env {
        if looks_secret(key) {
            writeln!(out, "   {key}=******** (value hidden, enter it yourself)")?;
        } else {
            writeln!(out, "   {key}={value}")?;
        }
    }
    writeln!(out, "5. Click \"Deploy\" and wait for the first worker to become ready")?;
    Ok(())
}

const SECRET_MARKERS: [&str; 6] = ["TOKEN", "SECRET", "PASSWORD", "PASSWD", "KEY", "CREDENTIAL"];

/// Names like `HF_TOKEN` or `OPENAI_API_KEY`; their values are not printed.
fn looks_secret(name: &str) -> bool {
    let name = name.to_ascii_uppercase();
    SECRET_MARKERS.iter().any(|marker| name.contains(marker))
}
