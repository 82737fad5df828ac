//! Client options and environment flags.
//!
//! [`ClientOptions`] is plain data loadable from TOML. Process-level flags
//! live in [`Environment`] so that endpoint resolution stays a pure
//! function of its inputs.

use crate::{Error, Result};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};
use wcore::ImageDetail;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Client configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientOptions {
    /// API key for the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// OpenAI-compatible reverse proxy to send requests to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverse_proxy_url: Option<String>,
    /// Name of the endpoint this client serves, keys `models_config`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<CompactString>,
    /// Preferred model for requests carrying images.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_vision_model: Option<CompactString>,
    /// Instructions placed in front of the conversation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_prefix: Option<String>,
    /// Display name attached to user messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Display label attached to assistant messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_label: Option<String>,
    /// What to do with history that does not fit.
    pub context_strategy: ContextStrategy,
    /// Override of the model's context window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_context_tokens: Option<usize>,
    /// Override of the prompt budget.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_prompt_tokens: Option<usize>,
    /// Detail level requested for attached images.
    pub image_detail: ImageDetail,
    /// Force legacy prompt payloads regardless of the derived mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_prompt: Option<bool>,
    /// Request parameters.
    pub model_options: ModelOptions,
    /// Models enabled per endpoint.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub models_config: BTreeMap<CompactString, Vec<CompactString>>,
    /// Azure deployment, when requests target Azure OpenAI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureOptions>,
}

impl ClientOptions {
    /// Create options for the given model with everything else defaulted.
    pub fn new(model: impl Into<CompactString>) -> Self {
        Self {
            model_options: ModelOptions::new(model),
            ..Default::default()
        }
    }

    /// Parse options from a TOML string.
    pub fn from_toml(toml_str: &str) -> anyhow::Result<Self> {
        let options: Self = toml::from_str(toml_str)?;
        Ok(options)
    }

    /// Load options from a file path.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Models enabled for the configured endpoint, if any are listed.
    pub fn enabled_models(&self) -> Option<&[CompactString]> {
        let endpoint = self.endpoint.as_ref()?;
        self.models_config.get(endpoint).map(Vec::as_slice)
    }
}

/// Provider request parameters.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelOptions {
    /// Model identifier.
    pub model: CompactString,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Nucleus sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Presence penalty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    /// Frequency penalty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Stop sequences.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// End-user identifier forwarded to the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl ModelOptions {
    /// Options for `model` with provider defaults for everything else.
    pub fn new(model: impl Into<CompactString>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            temperature: None,
            top_p: None,
            presence_penalty: None,
            frequency_penalty: None,
            max_tokens: None,
            stop: None,
            user: None,
        }
    }
}

/// Azure OpenAI deployment coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AzureOptions {
    /// Resource instance, the `{instance}.openai.azure.com` subdomain.
    pub instance_name: CompactString,
    /// Deployment serving the model.
    pub deployment_name: CompactString,
    /// REST API version.
    pub api_version: CompactString,
}

impl AzureOptions {
    /// Reject coordinates that cannot form an endpoint.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("instance_name", &self.instance_name),
            ("deployment_name", &self.deployment_name),
            ("api_version", &self.api_version),
        ] {
            if value.trim().is_empty() {
                return Err(Error::config(format!("azure.{field} must not be empty")));
            }
        }
        Ok(())
    }

    /// Chat completions URL for a deployment on this instance.
    pub fn endpoint(&self, deployment: &str) -> String {
        format!(
            "https://{}.openai.azure.com/openai/deployments/{deployment}/chat/completions?api-version={}",
            self.instance_name, self.api_version
        )
    }
}

/// Handling of history that exceeds the prompt budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextStrategy {
    /// Drop the oldest messages.
    #[default]
    Truncate,
    /// Replace the oldest messages with one summary.
    Summarize,
}

/// Process-level flags read from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// `AZURE_OPENAI_DEFAULT_MODEL`
    pub azure_default_model: Option<CompactString>,
    /// `AZURE_USE_MODEL_AS_DEPLOYMENT_NAME`
    pub use_model_as_deployment_name: bool,
    /// `OPENAI_FORCE_PROMPT`
    pub force_prompt: bool,
}

impl Environment {
    /// Read the flags from the process environment.
    pub fn from_env() -> Self {
        Self {
            azure_default_model: std::env::var("AZURE_OPENAI_DEFAULT_MODEL")
                .ok()
                .map(|model| model.trim().into())
                .filter(|model: &CompactString| !model.is_empty()),
            use_model_as_deployment_name: flag("AZURE_USE_MODEL_AS_DEPLOYMENT_NAME"),
            force_prompt: flag("OPENAI_FORCE_PROMPT"),
        }
    }
}

fn flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|value| value.trim().eq_ignore_ascii_case("true"))
}

/// Options for one `build_messages` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Produce chat messages rather than a legacy prompt.
    pub is_chat_completion: bool,
    /// Instructions overriding the client-level prefix.
    pub prompt_prefix: Option<String>,
}

/// Options persisted alongside a conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveOptions {
    /// Assistant display label.
    pub model_label: Option<String>,
    /// Client-level instructions.
    pub prompt_prefix: Option<String>,
    /// Context window override.
    pub max_context_tokens: Option<usize>,
    /// Image detail level.
    pub image_detail: ImageDetail,
    /// Effective request parameters.
    pub model_options: ModelOptions,
}
