use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tag used when none is given.
pub const DEFAULT_TAG: &str = "latest";

const MAX_TAG_LEN: usize = 128;

/// A registry image reference, always normalized to `namespace/name:tag`,
/// prefixed with `host/` when the image does not live on Docker Hub.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    registry: Option<String>,
    namespace: String,
    name: String,
    tag: String,
}

impl ImageRef {
    /// Normalize and validate a reference.
    ///
    /// Namespace and name are trimmed and lowercased (registries reject
    /// uppercase repository names). A missing or blank tag becomes `latest`.
    pub fn new(namespace: &str, name: &str, tag: Option<&str>) -> Result<Self, ConfigError> {
        let namespace = namespace.trim().to_ascii_lowercase();
        let name = name.trim().to_ascii_lowercase();
        let tag = match tag.map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => DEFAULT_TAG.to_string(),
        };

        if namespace.is_empty() {
            return Err(ConfigError::Missing {
                field: "registry username",
            });
        }
        if !is_valid_component(&namespace) {
            return Err(ConfigError::InvalidValue {
                field: "registry username",
                reason: format!("'{namespace}' is not a valid repository namespace"),
            });
        }
        if name.is_empty() {
            return Err(ConfigError::Missing { field: "image name" });
        }
        if !is_valid_component(&name) {
            return Err(ConfigError::InvalidValue {
                field: "image name",
                reason: format!("'{name}' is not a valid repository name"),
            });
        }
        if !is_valid_tag(&tag) {
            return Err(ConfigError::InvalidValue {
                field: "tag",
                reason: format!("'{tag}' is not a valid image tag"),
            });
        }

        Ok(Self {
            registry: None,
            namespace,
            name,
            tag,
        })
    }

    /// Place the image on a registry host such as `ghcr.io` or
    /// `localhost:5000`. `None` or a blank host keeps Docker Hub.
    pub fn with_registry(mut self, host: Option<&str>) -> Result<Self, ConfigError> {
        let host = host
            .map(|h| {
                let h = h.trim();
                let h = h
                    .strip_prefix("https://")
                    .or_else(|| h.strip_prefix("http://"))
                    .unwrap_or(h);
                h.trim_end_matches('/').to_ascii_lowercase()
            })
            .filter(|h| !h.is_empty());

        if let Some(h) = &host {
            if !is_valid_host(h) {
                return Err(ConfigError::InvalidValue {
                    field: "registry",
                    reason: format!("'{h}' is not a valid registry host"),
                });
            }
        }
        self.registry = host;
        Ok(self)
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// `[host/]namespace/name:tag`
    pub fn reference(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(host) = &self.registry {
            write!(f, "{host}/")?;
        }
        write!(f, "{}/{}:{}", self.namespace, self.name, self.tag)
    }
}

/// `[a-z0-9]+([._-][a-z0-9]+)*`
fn is_valid_component(s: &str) -> bool {
    let mut prev_sep = true;
    for c in s.chars() {
        match c {
            'a'..='z' | '0'..='9' => prev_sep = false,
            '.' | '_' | '-' => {
                if prev_sep {
                    return false;
                }
                prev_sep = true;
            }
            _ => return false,
        }
    }
    !prev_sep
}

/// `host[:port]` with dotted or dashed labels.
fn is_valid_host(s: &str) -> bool {
    let (host, port) = match s.rsplit_once(':') {
        Some((h, p)) => (h, Some(p)),
        None => (s, None),
    };
    let port_ok = port.map_or(true, |p| p.parse::<u16>().is_ok());
    let labels_ok = host.split('.').all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    port_ok && labels_ok
}

/// `[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}`
fn is_valid_tag(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    s.len() <= MAX_TAG_LEN
        && (first.is_ascii_alphanumeric() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}
