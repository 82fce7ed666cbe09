use std::time::Duration;

use anyhow::anyhow;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use codesearch_core::traits::EmbeddingProvider;
use codesearch_core::{Error, Result};

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    truncate: bool,
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

/// Client for an Ollama server's `/api/embed` endpoint.
pub struct OllamaProvider {
    client: Client,
    base_url: String,
}

impl OllamaProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(Error::backend)?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    pub fn base_url(&self) -> &str { &self.base_url }
}

impl EmbeddingProvider for OllamaProvider {
    fn name(&self) -> &str { "ollama" }

    fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embed", self.base_url);
        let request = EmbedRequest { model, input: vec![text], truncate: true };
        debug!(model, chars = text.len(), "requesting embedding");
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::provider(model, e))?;
        let body = response.text().map_err(|e| Error::provider(model, e))?;
        parse_embedding(model, &body)
    }
}

/// First embedding of an `/api/embed` response body; missing or empty
/// vectors are provider errors.
pub fn parse_embedding(model: &str, body: &str) -> Result<Vec<f32>> {
    let parsed: EmbedResponse = serde_json::from_str(body).map_err(|e| Error::provider(model, e))?;
    match parsed.embeddings.into_iter().next() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::provider(model, anyhow!("response carried no embedding"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_embedding() {
        let v = parse_embedding("m", r#"{"model":"m","embeddings":[[0.5,-0.25,1.0]]}"#).unwrap();
        assert_eq!(v, vec![0.5, -0.25, 1.0]);
    }

    #[test]
    fn missing_or_empty_embeddings_are_errors() {
        for body in [r#"{"model":"m"}"#, r#"{"embeddings":[]}"#, r#"{"embeddings":[[]]}"#, "not json"] {
            let err = parse_embedding("nomic", body).unwrap_err();
            assert!(matches!(err, Error::EmbeddingProvider { ref model, .. } if model == "nomic"), "{body}");
        }
    }

    #[test]
    fn unreachable_server_is_a_provider_error() {
        let provider = OllamaProvider::new("http://127.0.0.1:9/", Duration::from_millis(500)).unwrap();
        assert_eq!(provider.base_url(), "http://127.0.0.1:9");
        let err = provider.embed("nomic", "hello").unwrap_err();
        assert!(matches!(err, Error::EmbeddingProvider { .. }));
    }
}
