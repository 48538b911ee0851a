use std::io;

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input};
use podlift_common::{ConfigError, EnvironmentError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    /// The operator pressed Ctrl-C at the prompt.
    #[error("interrupted")]
    Interrupted,

    #[error("{0}")]
    Failed(String),
}

impl From<dialoguer::Error> for PromptError {
    fn from(err: dialoguer::Error) -> Self {
        match err {
            dialoguer::Error::IO(e) if e.kind() == io::ErrorKind::Interrupted => Self::Interrupted,
            other => Self::Failed(other.to_string()),
        }
    }
}

impl From<PromptError> for ConfigError {
    fn from(err: PromptError) -> Self {
        match err {
            PromptError::Interrupted => Self::Interrupted,
            PromptError::Failed(msg) => Self::Prompt(msg),
        }
    }
}

impl From<PromptError> for EnvironmentError {
    fn from(err: PromptError) -> Self {
        match err {
            PromptError::Interrupted => Self::Interrupted,
            PromptError::Failed(msg) => Self::Prompt(msg),
        }
    }
}

/// Source of a registry username when neither configuration nor environment
/// supplied one.
pub trait CredentialProvider: Send + Sync {
    fn username(&self) -> Result<Option<String>, PromptError>;
}

/// Answers yes/no questions such as "install the runtime?".
pub trait ConfirmationProvider: Send + Sync {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool, PromptError>;
}

/// Asks on the terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct InteractivePrompt {
    /// Answer every confirmation with "yes" without asking.
    pub assume_yes: bool,
}

impl CredentialProvider for InteractivePrompt {
    fn username(&self) -> Result<Option<String>, PromptError> {
        let value: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("Docker Hub username")
            .allow_empty(true)
            .interact_text()?;
        let value = value.trim();
        Ok((!value.is_empty()).then(|| value.to_string()))
    }
}

impl ConfirmationProvider for InteractivePrompt {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool, PromptError> {
        if self.assume_yes {
            return Ok(true);
        }
        Ok(Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(default)
            .interact()?)
    }
}

/// Never touches the terminal: no username beyond configuration, and a fixed
/// answer to every confirmation.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessPrompt {
    pub assume_yes: bool,
}

impl CredentialProvider for HeadlessPrompt {
    fn username(&self) -> Result<Option<String>, PromptError> {
        Ok(None)
    }
}

impl ConfirmationProvider for HeadlessPrompt {
    fn confirm(&self, prompt: &str, _default: bool) -> Result<bool, PromptError> {
        tracing::debug!(%prompt, answer = self.assume_yes, "non-interactive confirmation");
        Ok(self.assume_yes)
    }
}
