//! HTTP transport for OpenAI-compatible providers.
//!
//! `HttpProvider` wraps a `reqwest::Client` with pre-configured headers and
//! the resolved completions URL. Implements [`Model`]: `send()` posts a
//! non-streaming request and `stream()` parses Server-Sent Events.

use crate::{ClientOptions, Resolved};
use anyhow::Result;
use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::{
    Client, Method,
    header::{self, HeaderMap, HeaderName, HeaderValue},
};
use wcore::{Model, Request, Response, StreamChunk};

/// Header carrying the key for Azure OpenAI.
pub const AZURE_API_KEY_HEADER: &str = "api-key";

/// HTTP transport for OpenAI-compatible providers.
///
/// Holds a `reqwest::Client`, pre-built headers (auth + content-type),
/// and the target endpoint URL.
#[derive(Clone)]
pub struct HttpProvider {
    client: Client,
    headers: HeaderMap,
    endpoint: String,
}

impl HttpProvider {
    /// Create a provider with Bearer token authentication.
    pub fn bearer(client: Client, key: &str, endpoint: &str) -> Result<Self> {
        let mut headers = json_headers();
        headers.insert(header::AUTHORIZATION, format!("Bearer {key}").parse()?);
        Ok(Self {
            client,
            headers,
            endpoint: endpoint.to_owned(),
        })
    }

    /// Create a provider without authentication (e.g. a local proxy).
    pub fn no_auth(client: Client, endpoint: &str) -> Self {
        Self {
            client,
            headers: json_headers(),
            endpoint: endpoint.to_owned(),
        }
    }

    /// Create a provider with a custom header for authentication.
    ///
    /// Used by Azure OpenAI, which takes the key in `api-key`.
    pub fn custom_header(
        client: Client,
        header_name: &str,
        header_value: &str,
        endpoint: &str,
    ) -> Result<Self> {
        let mut headers = json_headers();
        headers.insert(
            header_name.parse::<HeaderName>()?,
            header_value.parse::<HeaderValue>()?,
        );
        Ok(Self {
            client,
            headers,
            endpoint: endpoint.to_owned(),
        })
    }

    /// Create the provider a resolved configuration targets.
    ///
    /// Azure takes the key in `api-key`, everything else as a Bearer
    /// token; without a key no authentication is sent.
    pub fn for_target(client: Client, options: &ClientOptions, resolved: &Resolved) -> Result<Self> {
        let key = options.api_key.as_deref().filter(|key| !key.is_empty());
        match (key, &resolved.azure_endpoint) {
            (Some(key), Some(azure)) if options.reverse_proxy_url.is_none() => {
                Self::custom_header(client, AZURE_API_KEY_HEADER, key, azure)
            }
            (Some(key), _) => Self::bearer(client, key, &resolved.completions_url),
            (None, _) => Ok(Self::no_auth(client, &resolved.completions_url)),
        }
    }

    /// Get the endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Get a reference to the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl Model for HttpProvider {
    fn set_endpoint(&mut self, endpoint: &str) {
        endpoint.clone_into(&mut self.endpoint);
    }

    async fn send(&self, request: &Request) -> Result<Response> {
        tracing::trace!("request: {}", serde_json::to_string(request)?);
        let text = self
            .client
            .request(Method::POST, &self.endpoint)
            .headers(self.headers.clone())
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        serde_json::from_str(&text).map_err(Into::into)
    }

    /// Buffers the body into Server-Sent Events, skips the `[DONE]`
    /// sentinel, and deserializes each event as [`StreamChunk`].
    fn stream(&self, mut request: Request) -> impl Stream<Item = Result<StreamChunk>> + Send + 'static {
        if request.stream.is_none() {
            request = request.stream(true);
        }
        if let Ok(body) = serde_json::to_string(&request) {
            tracing::trace!("request: {}", body);
        }
        let builder = self
            .client
            .request(Method::POST, &self.endpoint)
            .headers(self.headers.clone())
            .json(&request);

        try_stream! {
            let response = builder.send().await?.error_for_status()?;
            let mut stream = response.bytes_stream();
            let mut events = SseBuffer::default();
            while let Some(next) = stream.next().await {
                for chunk in events.push(&next?) {
                    yield chunk;
                }
            }
            if let Some(chunk) = events.finish() {
                yield chunk;
            }
        }
    }
}

/// Reassembles Server-Sent Events split across network reads.
///
/// Bytes are buffered until a blank line closes the event, so neither an
/// event nor a multi-byte character is cut in half.
#[derive(Debug, Default)]
pub struct SseBuffer {
    buf: Vec<u8>,
}

impl SseBuffer {
    /// Feed one network read, returning the chunks it completed.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamChunk> {
        self.buf.extend(bytes.iter().copied().filter(|byte| *byte != b'\r'));
        let mut chunks = Vec::new();
        while let Some(pos) = self.buf.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = self.buf.drain(..pos + 2).collect();
            chunks.extend(parse_sse_block(&block));
        }
        chunks
    }

    /// Parse whatever the provider sent without a closing blank line.
    pub fn finish(self) -> Option<StreamChunk> {
        parse_sse_block(&self.buf)
    }
}

/// Parse one event, joining its `data:` lines. `[DONE]` yields nothing.
fn parse_sse_block(block: &[u8]) -> Option<StreamChunk> {
    let text = String::from_utf8_lossy(block);
    let data = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect::<Vec<_>>()
        .join("\n");
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    tracing::trace!("chunk: {data}");
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => Some(chunk),
        Err(e) => {
            tracing::warn!("failed to parse chunk: {e}, data: {data}");
            None
        }
    }
}

fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    headers
}
