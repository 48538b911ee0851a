use podlift_common::{AuthError, ConfigError, Credentials, EnvSource, Secret};

use crate::events::{EventSink, Reporter, Stage};
use crate::prompt::CredentialProvider;
use crate::runtime::ContainerRuntime;

pub const USERNAME_VAR: &str = "DOCKERHUB_USERNAME";
/// Checked in order; the first non-empty value wins.
pub const SECRET_VARS: [&str; 2] = ["DOCKERHUB_TOKEN", "DOCKERHUB_PASSWORD"];

/// Credentials given directly in configuration (command line).
#[derive(Debug, Clone, Default)]
pub struct ExplicitCredentials {
    pub username: Option<String>,
    pub secret: Option<Secret>,
}

/// Proof that registry login succeeded in this process.
///
/// The login itself lives in the runtime's global credential store; this
/// value only exists so that pushing cannot be attempted without it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    username: String,
    registry: Option<String>,
}

impl Session {
    #[cfg(test)]
    pub(crate) fn for_tests(username: &str, registry: Option<&str>) -> Self {
        Self {
            username: username.to_string(),
            registry: registry.map(str::to_string),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve credentials: explicit value, then environment, then prompt.
///
/// Only the username is prompted for. A missing secret is not an error.
pub fn resolve_credentials(
    explicit: &ExplicitCredentials,
    env: &dyn EnvSource,
    prompt: &dyn CredentialProvider,
) -> Result<Credentials, ConfigError> {
    let username = match non_blank(explicit.username.clone()) {
        Some(u) => u,
        None => match non_blank(env.var(USERNAME_VAR)) {
            Some(u) => u,
            None => non_blank(prompt.username()?)
                .ok_or(ConfigError::Missing {
                    field: "registry username",
                })?,
        },
    };

    let secret = explicit.secret.clone().or_else(|| {
        SECRET_VARS
            .iter()
            .find_map(|key| env.var(key).and_then(Secret::non_empty))
    });

    Ok(Credentials { username, secret })
}

/// Resolves registry identity and logs in.
pub struct CredentialBroker<'a> {
    runtime: &'a dyn ContainerRuntime,
    env: &'a dyn EnvSource,
    prompt: &'a dyn CredentialProvider,
    report: Reporter<'a>,
    explicit: ExplicitCredentials,
}

impl<'a> CredentialBroker<'a> {
    pub fn new(
        runtime: &'a dyn ContainerRuntime,
        env: &'a dyn EnvSource,
        prompt: &'a dyn CredentialProvider,
        events: &'a dyn EventSink,
    ) -> Self {
        Self {
            runtime,
            env,
            prompt,
            report: Reporter::new(events, Stage::Credentials),
            explicit: ExplicitCredentials::default(),
        }
    }

    pub fn with_explicit(mut self, explicit: ExplicitCredentials) -> Self {
        self.explicit = explicit;
        self
    }

    pub fn resolve(&self) -> Result<Credentials, ConfigError> {
        let credentials = resolve_credentials(&self.explicit, self.env, self.prompt);
        if let Err(e) = &credentials {
            self.report.error(format!("Registry username is required: {e}"));
        }
        credentials
    }

    /// Log in once to `registry` (`None` is Docker Hub). Failures are never
    /// retried.
    pub async fn authenticate(
        &self,
        credentials: Credentials,
        registry: Option<&str>,
    ) -> Result<Session, AuthError> {
        let Credentials { username, secret } = credentials;
        let host = registry.unwrap_or("Docker Hub");
        if secret.is_some() {
            self.report
                .info(format!("Logging into {host} as {username} (token from configuration)"));
        } else {
            self.report.info(format!(
                "Logging into {host} as {username}; the runtime will ask for the password"
            ));
        }

        let output = self
            .runtime
            .login(registry, &username, secret.as_ref())
            .await?;

        if !output.success() {
            self.report
                .error("Docker login failed. Please check your credentials.");
            return Err(AuthError::Rejected {
                username,
                output: output.diagnostic(),
            });
        }

        self.report.success(format!("Logged into {host}"));
        Ok(Session {
            username,
            registry: registry.map(str::to_string),
        })
    }
}
