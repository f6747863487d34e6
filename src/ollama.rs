/// Ollama HTTP client module.
///
/// This module provides a blocking HTTP client for the Ollama generate API,
/// streaming responses as a lazy sequence of text chunks, with error
/// handling, retry logic and timeout configuration.
mod client;

pub use client::{
    ChunkStream, NdjsonChunks, OllamaClient, OllamaClientBuilder, OllamaClientTrait, OllamaError,
    retry_with_backoff,
};
