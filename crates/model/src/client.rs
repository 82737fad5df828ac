//! Client facade.
//!
//! [`Client`] owns the options, their resolution and the token counter for
//! the effective model, and dispatches assembled prompts through a
//! [`Model`] transport.

use crate::{
    BuildOptions, Built, ClientOptions, Environment, Error, HttpProvider, ModelOptions, Payload,
    Resolved, Result, SaveOptions, StreamHandle, VisionCheck, Window, assemble, check_vision,
    resolve, tokenizer::TokenCounter,
};
use wcore::{Attachment, History, Message, Model, Request, Response, Summarizer, Usage};

/// Adapter for one OpenAI-compatible endpoint.
pub struct Client<M = HttpProvider, S = ()> {
    options: ClientOptions,
    env: Environment,
    resolved: Resolved,
    counter: TokenCounter,
    is_vision_model: bool,
    usage: Option<Usage>,
    model: M,
    summarizer: S,
}

impl Client {
    /// Create a client talking HTTP to the resolved target.
    pub fn http(options: ClientOptions, env: Environment) -> Result<Self> {
        let resolved = resolve(&options, &env)?;
        let model = HttpProvider::for_target(reqwest::Client::new(), &options, &resolved)
            .map_err(|e| Error::config(e.to_string()))?;
        Ok(Self::with_resolved(options, env, resolved, model, ()))
    }
}

impl<M: Model, S: Summarizer> Client<M, S> {
    /// Create a client with a custom transport and summarizer.
    pub fn new(options: ClientOptions, env: Environment, model: M, summarizer: S) -> Result<Self> {
        let resolved = resolve(&options, &env)?;
        Ok(Self::with_resolved(options, env, resolved, model, summarizer))
    }

    fn with_resolved(
        options: ClientOptions,
        env: Environment,
        resolved: Resolved,
        model: M,
        summarizer: S,
    ) -> Self {
        let counter = TokenCounter::for_model(&resolved.model_options.model);
        Self {
            options,
            env,
            resolved,
            counter,
            is_vision_model: false,
            usage: None,
            model,
            summarizer,
        }
    }

    /// Replace the options and re-derive the target.
    ///
    /// On error the previous configuration stays in effect.
    pub fn set_options(&mut self, options: ClientOptions) -> Result<()> {
        let resolved = resolve(&options, &self.env)?;
        self.counter = TokenCounter::for_model(&resolved.model_options.model);
        self.options = options;
        self.resolved = resolved;
        self.is_vision_model = false;
        Ok(())
    }

    /// The configured options.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// The derived target and budgets.
    pub fn resolved(&self) -> &Resolved {
        &self.resolved
    }

    /// Effective request parameters.
    pub fn model_options(&self) -> &ModelOptions {
        &self.resolved.model_options
    }

    /// The transport requests are dispatched through.
    pub fn transport(&self) -> &M {
        &self.model
    }

    /// Whether the last vision check routed to a vision model.
    pub fn is_vision_model(&self) -> bool {
        self.is_vision_model
    }

    /// Tokens in plain text for the effective model.
    pub fn token_count(&self, text: &str) -> usize {
        self.counter.count_text(text)
    }

    /// Tokens a message occupies for the effective model.
    pub fn token_count_for_message(&self, message: &Message) -> usize {
        self.counter.count_message(message)
    }

    /// Route the request to a vision model if images are attached.
    ///
    /// A substitute model re-derives the target and budgets as if it had
    /// been configured, keeping the previous state if that fails. `stop`
    /// is cleared whenever a vision model serves the request.
    pub fn check_vision_request(&mut self, attachments: &[Attachment]) -> Result<VisionCheck> {
        let check = check_vision(
            &self.resolved.model_options.model,
            attachments,
            self.options.enabled_models(),
            self.options.default_vision_model.as_deref(),
        );
        if let VisionCheck::Vision { model, substituted } = &check {
            if *substituted {
                tracing::debug!(
                    "routing vision request from {} to {model}",
                    self.resolved.model_options.model
                );
                self.retarget(model)?;
            }
            self.resolved.model_options.stop = None;
            self.is_vision_model = true;
        }
        Ok(check)
    }

    fn retarget(&mut self, model: &str) -> Result<()> {
        let mut options = self.options.clone();
        options.model_options.model = model.into();
        // the substitute must not be replaced by the Azure default model
        let env = Environment {
            azure_default_model: None,
            ..self.env.clone()
        };
        let resolved = resolve(&options, &env)?;
        if resolved.completions_url != self.resolved.completions_url {
            self.model.set_endpoint(&resolved.completions_url);
        }
        self.counter = TokenCounter::for_model(model);
        self.resolved = resolved;
        Ok(())
    }

    /// Options for [`Client::build_messages`], `prompt_prefix` overriding
    /// the configured one.
    pub fn build_options(&self, prompt_prefix: Option<&str>) -> BuildOptions {
        BuildOptions {
            is_chat_completion: self.resolved.is_chat_completion,
            prompt_prefix: prompt_prefix.map(str::to_owned),
        }
    }

    /// Options persisted with the conversation.
    pub fn save_options(&self) -> SaveOptions {
        SaveOptions {
            model_label: self.options.model_label.clone(),
            prompt_prefix: self.options.prompt_prefix.clone(),
            max_context_tokens: self.options.max_context_tokens,
            image_detail: self.options.image_detail,
            model_options: self.resolved.model_options.clone(),
        }
    }

    /// Assemble the prompt for the conversation ending at `leaf`.
    pub async fn build_messages<H: History + ?Sized>(
        &self,
        history: &H,
        leaf: &str,
        options: &BuildOptions,
    ) -> Result<Built> {
        let window = Window {
            max_prompt_tokens: self.resolved.max_prompt_tokens,
            strategy: self.options.context_strategy,
            prompt_prefix: options
                .prompt_prefix
                .clone()
                .or_else(|| self.options.prompt_prefix.clone()),
            user_name: self.options.name.clone(),
            assistant_label: self.options.model_label.clone(),
            image_detail: self.options.image_detail,
            is_chat_completion: options.is_chat_completion,
        };
        assemble(history, leaf, &window, &self.counter, &self.summarizer).await
    }

    /// Request body for a payload with the effective parameters.
    pub fn request(&self, payload: &Payload) -> Request {
        let options = &self.resolved.model_options;
        let request = Request {
            temperature: options.temperature,
            top_p: options.top_p,
            frequency_penalty: options.frequency_penalty,
            presence_penalty: options.presence_penalty,
            max_tokens: options.max_tokens,
            stop: options.stop.clone(),
            user: options.user.clone(),
            ..Request::new(options.model.as_str())
        };
        match payload {
            Payload::Chat(messages) => request.with_messages(messages.clone()),
            Payload::Text(prompt) => request.with_prompt(prompt.as_str()),
        }
    }

    /// Send a payload and wait for the whole response.
    pub async fn send(&mut self, payload: &Payload) -> Result<Response> {
        let response = self
            .model
            .send(&self.request(payload))
            .await
            .map_err(Error::Transport)?;
        self.usage = response.usage.clone();
        Ok(response)
    }

    /// Stream a payload, asking the provider to report usage.
    pub fn stream(&self, payload: &Payload) -> StreamHandle {
        StreamHandle::new(self.model.stream(self.request(payload).stream(true)))
    }

    /// Record usage reported outside [`Client::send`], e.g. by a stream.
    pub fn record_usage(&mut self, usage: Usage) {
        self.usage = Some(usage);
    }

    /// The last recorded usage, reconciled for split reasoning accounting.
    pub fn stream_usage(&self) -> Option<Usage> {
        self.usage.as_ref().map(Usage::reconcile)
    }
}
