/// Ollama HTTP client implementation.
///
/// This module provides `OllamaClient` for making synchronous streaming requests
/// to the Ollama API, along with error types and builder patterns for configuration.
use std::io::{BufRead, BufReader};
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Default request timeout, covering the whole streamed response.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Errors that can occur when interacting with the Ollama API.
#[derive(Debug, Error)]
pub enum OllamaError {
    /// Network-related errors (connection failures, DNS resolution, etc.)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Request or response timeout errors
    #[error("Request timed out")]
    Timeout(#[source] reqwest::Error),

    /// HTTP errors with status code
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Reading the streamed response body failed part-way
    #[error("Stream interrupted: {0}")]
    Stream(#[source] std::io::Error),

    /// Ollama API-specific errors
    #[error("Ollama API error: {message}")]
    Api { message: String },

    /// The backend finished without producing any text
    #[error("Backend returned an empty response")]
    EmptyResponse,

    /// Invalid URL configuration error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl OllamaError {
    /// Maps a reqwest failure, keeping timeouts distinct from other network errors.
    fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            OllamaError::Timeout(error)
        } else {
            OllamaError::Network(error)
        }
    }
}

/// Lazy, finite, one-shot sequence of generated text chunks.
///
/// Concatenating every `Ok` item in order reconstructs the full response.
pub type ChunkStream = Box<dyn Iterator<Item = Result<String, OllamaError>> + Send>;

/// Builder for constructing `OllamaClient` instances.
///
/// # Examples
///
/// ```
/// use lexis::ollama::OllamaClientBuilder;
///
/// let client = OllamaClientBuilder::new()
///     .base_url("http://localhost:11434")
///     .build()
///     .expect("Failed to create client");
/// ```
#[derive(Debug, Default)]
pub struct OllamaClientBuilder {
    base_url: Option<String>,
    model: Option<String>,
    timeout: Option<Duration>,
}

impl OllamaClientBuilder {
    /// Creates a new `OllamaClientBuilder` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL for the Ollama API.
    ///
    /// # Arguments
    ///
    /// * `url` - The base URL (e.g., "http://localhost:11434")
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model name for Ollama API calls.
    ///
    /// # Arguments
    ///
    /// * `model` - The model name (e.g., "gemma3:4b" or "llama3.1:8b")
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the timeout for one generation request, including the streamed body.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the `OllamaClient` with the configured settings.
    ///
    /// # Environment Variables
    ///
    /// If `base_url()` was not called, this method will check the `OLLAMA_HOST`
    /// environment variable. If not set, it defaults to `http://localhost:11434`.
    ///
    /// If `model()` was not called, this method will check the `OLLAMA_MODEL`
    /// environment variable. If not set, it defaults to an empty string.
    ///
    /// # Errors
    ///
    /// Returns `OllamaError::InvalidUrl` for an unparseable base URL.
    pub fn build(self) -> Result<OllamaClient, OllamaError> {
        let base_url = if let Some(url) = self.base_url {
            url
        } else {
            std::env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost:11434".to_string())
        };

        let model = if let Some(m) = self.model {
            m
        } else {
            std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| String::new())
        };

        reqwest::Url::parse(&base_url)
            .map_err(|e| OllamaError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(
                self.timeout
                    .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            )
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(OllamaError::Network)?;

        Ok(OllamaClient {
            client,
            base_url,
            model,
        })
    }
}

/// Synchronous HTTP client for interacting with the Ollama API.
///
/// It should be constructed using `OllamaClientBuilder`.
pub struct OllamaClient {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
}

/// Trait for streaming text-generation backends.
///
/// This trait enables mocking in unit tests: any type that can turn a prompt
/// into a chunk sequence can drive lesson generation.
pub trait OllamaClientTrait: Send + Sync {
    /// Starts a generation and returns its chunk stream.
    ///
    /// # Arguments
    ///
    /// * `model` - The name of the model to use
    /// * `prompt` - The prompt text to send to the model
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be started. Failures after the
    /// first chunk arrive as `Err` items inside the stream.
    fn generate_stream(&self, model: &str, prompt: &str) -> Result<ChunkStream, OllamaError>;
}

impl OllamaClient {
    /// Returns the base URL configured for this client.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the model name configured for this client.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Opens a streaming `/api/generate` request.
    ///
    /// Only establishing the response is retried; once chunks flow, an
    /// interruption ends the stream with an error.
    fn open_stream(&self, model: &str, prompt: &str) -> Result<ChunkStream, OllamaError> {
        let url = format!("{}/api/generate", self.base_url);
        let request_body = serde_json::json!({
            "model": model,
            "prompt": prompt,
            "stream": true
        });

        let response = retry_with_backoff(|| {
            let response = self
                .client
                .post(&url)
                .json(&request_body)
                .send()
                .map_err(OllamaError::from_reqwest)?;

            let status = response.status();
            if !status.is_success() {
                return Err(OllamaError::Http {
                    status: status.as_u16(),
                });
            }

            Ok(response)
        })?;

        debug!(model, "Generation stream opened");
        Ok(Box::new(NdjsonChunks::new(BufReader::new(response))))
    }
}

impl OllamaClientTrait for OllamaClient {
    fn generate_stream(&self, model: &str, prompt: &str) -> Result<ChunkStream, OllamaError> {
        self.open_stream(model, prompt)
    }
}

/// One line of Ollama's newline-delimited streaming response.
#[derive(Debug, Deserialize)]
struct StreamLine {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Iterator over the text chunks of a newline-delimited JSON response body.
///
/// Empty chunks are skipped. The iterator ends after the line marked
/// `done`; a body that ends without one yields a final `Api` error so a
/// truncated generation is never mistaken for a complete one.
pub struct NdjsonChunks<R> {
    reader: R,
    line: String,
    finished: bool,
}

impl<R: BufRead> NdjsonChunks<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            finished: false,
        }
    }

    fn fail(&mut self, error: OllamaError) -> Option<Result<String, OllamaError>> {
        self.finished = true;
        Some(Err(error))
    }
}

impl<R: BufRead> Iterator for NdjsonChunks<R> {
    type Item = Result<String, OllamaError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => {
                    return self.fail(OllamaError::Api {
                        message: "stream ended before generation completed".to_string(),
                    });
                }
                Ok(_) => {}
                Err(e) => return self.fail(OllamaError::Stream(e)),
            }

            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let parsed: StreamLine = match serde_json::from_str(trimmed) {
                Ok(parsed) => parsed,
                Err(e) => return self.fail(OllamaError::Serialization(e)),
            };

            if let Some(message) = parsed.error {
                return self.fail(OllamaError::Api { message });
            }
            if parsed.done {
                self.finished = true;
            }
            if !parsed.response.is_empty() {
                return Some(Ok(parsed.response));
            }
        }
        None
    }
}

/// Retries an operation with exponential backoff.
///
/// This function will retry the operation up to 3 times with delays of 1s, 2s, and 4s.
/// It only retries on transient errors (HTTP 5xx and network errors), not on client errors (HTTP 4xx).
///
/// # Arguments
///
/// * `f` - A closure producing a `Result<T, OllamaError>`
///
/// # Returns
///
/// Returns the result of the operation if it succeeds, or the last error if all retries fail.
pub fn retry_with_backoff<F, T>(mut f: F) -> Result<T, OllamaError>
where
    F: FnMut() -> Result<T, OllamaError>,
{
    const MAX_RETRIES: usize = 3;
    const DELAYS: [u64; MAX_RETRIES] = [1, 2, 4]; // seconds

    let mut last_error = match f() {
        Ok(result) => return Ok(result),
        Err(e) => {
            if !should_retry(&e) {
                return Err(e);
            }
            e
        }
    };

    for &delay_secs in &DELAYS {
        warn!(error = %last_error, delay_secs, "Transient backend error, retrying");
        thread::sleep(Duration::from_secs(delay_secs));

        match f() {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !should_retry(&e) {
                    return Err(e);
                }
                last_error = e;
            }
        }
    }

    Err(last_error)
}

/// Determines if an error should be retried.
///
/// Returns `true` for transient errors (HTTP 5xx, network errors, timeouts).
/// Returns `false` for client errors (HTTP 4xx) and other non-retryable errors.
fn should_retry(error: &OllamaError) -> bool {
    match error {
        OllamaError::Network(_) => true,
        OllamaError::Timeout(_) => true,
        OllamaError::Http { status } => (500..600).contains(status),
        OllamaError::Serialization(_) => false,
        OllamaError::Stream(_) => false,
        OllamaError::Api { .. } => false,
        OllamaError::EmptyResponse => false,
        OllamaError::InvalidUrl(_) => false,
    }
}
