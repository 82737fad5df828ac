//! Endpoint resolution.
//!
//! Derives the request target, payload mode and token budgets from
//! [`ClientOptions`] and [`Environment`]. Resolution never touches the
//! network and returns the same [`Resolved`] for the same inputs.

use crate::{
    ClientOptions, ContextStrategy, Environment, Error, ModelOptions, Result,
    limits::default_context_limit,
};
use url::Url;

/// OpenAI chat completions URL.
pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI legacy completions URL.
pub const OPENAI_COMPLETIONS_URL: &str = "https://api.openai.com/v1/completions";

/// Response budget used when `max_tokens` is not configured.
pub const DEFAULT_MAX_RESPONSE_TOKENS: usize = 1024;

/// Model families served only by the legacy completions API.
const COMPLETIONS_ONLY: &[&str] = &["text-davinci", "gpt-3.5-turbo-instruct"];

/// The concrete target and budgets for a set of options.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// Request parameters with the effective model.
    pub model_options: ModelOptions,
    /// Whether payloads are chat messages.
    pub is_chat_completion: bool,
    /// Whether payloads are forced into a single legacy prompt.
    pub force_prompt: bool,
    /// URL requests are posted to.
    pub completions_url: String,
    /// Base URL of the reverse proxy for OpenAI SDK style clients.
    pub langchain_proxy: Option<String>,
    /// Azure deployment URL, when Azure is configured.
    pub azure_endpoint: Option<String>,
    /// Context window.
    pub max_context_tokens: usize,
    /// Tokens reserved for the reply.
    pub max_response_tokens: usize,
    /// Tokens available to the prompt.
    pub max_prompt_tokens: usize,
}

/// Resolve `options` against the environment.
pub fn resolve(options: &ClientOptions, env: &Environment) -> Result<Resolved> {
    let mut model_options = options.model_options.clone();
    if model_options.model.trim().is_empty() {
        return Err(Error::config("model must not be empty"));
    }

    let azure_endpoint = match &options.azure {
        Some(azure) => {
            azure.validate()?;
            if let Some(model) = &env.azure_default_model {
                model_options.model = model.clone();
            }
            let deployment = if env.use_model_as_deployment_name {
                deployment_name(&model_options.model)
            } else {
                azure.deployment_name.to_string()
            };
            Some(azure.endpoint(&deployment))
        }
        None => None,
    };

    let proxy = options
        .reverse_proxy_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty());
    let proxy_url = proxy
        .map(|proxy| {
            Url::parse(proxy)
                .map_err(|e| Error::config(format!("invalid reverse_proxy_url {proxy}: {e}")))
        })
        .transpose()?;
    let completions_endpoint = proxy_url.as_ref().is_some_and(is_completions_endpoint);
    let force_prompt = options
        .force_prompt
        .unwrap_or(env.force_prompt || completions_endpoint);
    let is_chat_completion = !force_prompt
        && (proxy.is_some()
            || azure_endpoint.is_some()
            || !is_completions_only(&model_options.model));

    let completions_url = match (proxy, &azure_endpoint) {
        (Some(proxy), _) => proxy.to_owned(),
        (None, Some(azure)) => azure.clone(),
        (None, None) if is_chat_completion => OPENAI_CHAT_URL.to_owned(),
        (None, None) => OPENAI_COMPLETIONS_URL.to_owned(),
    };
    let langchain_proxy = proxy_url.as_ref().map(langchain_base);

    let mut max_context_tokens = options
        .max_context_tokens
        .unwrap_or_else(|| default_context_limit(&model_options.model));
    if options.context_strategy == ContextStrategy::Summarize {
        max_context_tokens /= 2;
    }
    let max_response_tokens = model_options
        .max_tokens
        .map_or(DEFAULT_MAX_RESPONSE_TOKENS, |tokens| tokens as usize);
    let max_prompt_tokens = options
        .max_prompt_tokens
        .unwrap_or_else(|| max_context_tokens.saturating_sub(max_response_tokens));
    if max_prompt_tokens + max_response_tokens > max_context_tokens {
        return Err(Error::config(format!(
            "max_prompt_tokens ({max_prompt_tokens}) + max_response_tokens \
             ({max_response_tokens}) must not exceed max_context_tokens ({max_context_tokens})"
        )));
    }

    tracing::debug!(
        "resolved {} chat={is_chat_completion} force_prompt={force_prompt} \
         context={max_context_tokens} prompt={max_prompt_tokens}",
        model_options.model
    );
    Ok(Resolved {
        model_options,
        is_chat_completion,
        force_prompt,
        completions_url,
        langchain_proxy,
        azure_endpoint,
        max_context_tokens,
        max_response_tokens,
        max_prompt_tokens,
    })
}

/// Whether a proxy URL addresses the legacy completions API.
///
/// Only the path is inspected, so hosts named after chat do not count.
pub fn is_completions_endpoint(url: &Url) -> bool {
    let path = url.path();
    path.contains("completions") && !path.contains("chat")
}

/// Whether a model is served only by the legacy completions API.
pub fn is_completions_only(model: &str) -> bool {
    COMPLETIONS_ONLY.iter().any(|prefix| model.starts_with(prefix))
}

/// Base URL of a proxy, with the chat path stripped.
///
/// `https://host/v1/chat/completions` becomes `https://host/v1`; legacy
/// completions URLs are returned as given.
pub fn langchain_base(url: &Url) -> String {
    if is_completions_endpoint(url) {
        return url.to_string();
    }
    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    let keep = segments
        .iter()
        .position(|segment| *segment == "chat")
        .unwrap_or(segments.len());

    let mut base = url.clone();
    base.set_query(None);
    base.set_fragment(None);
    base.set_path(&segments[..keep].join("/"));
    base.as_str().trim_end_matches('/').to_owned()
}

/// Azure deployment name for a model; Azure forbids dots.
pub fn deployment_name(model: &str) -> String {
    model.replace('.', "")
}
