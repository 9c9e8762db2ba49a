use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

pub const DEFAULT_MODEL: &str = "all-mpnet-base-v2";

/// External capability: map a batch of texts to unit-normalized vectors.
///
/// Row order must match input order exactly. A provider either embeds the
/// whole batch or fails the whole batch; there is no partial result.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
  async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
  model: &'a str,
  texts: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
  #[serde(default)]
  embeddings: Vec<Vec<f32>>,
  #[serde(default)]
  error: Option<String>,
}

/// Embedding provider backed by an HTTP embedding service
pub struct HttpEmbeddingProvider {
  endpoint: String,
  model: String,
  client: reqwest::Client,
}

impl HttpEmbeddingProvider {
  pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
    Self {
      endpoint: endpoint.into(),
      model: model.into(),
      client: reqwest::Client::new(),
    }
  }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
  async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
    let request = EmbeddingRequest { model: &self.model, texts };

    let response = self
      .client
      .post(&self.endpoint)
      .json(&request)
      .send()
      .await
      .map_err(|e| ProviderError::Unreachable(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
      return Err(ProviderError::Remote(format!("endpoint returned {status}")));
    }

    let body: EmbeddingResponse =
      response.json().await.map_err(|e| ProviderError::Malformed(e.to_string()))?;

    if let Some(error) = body.error {
      return Err(ProviderError::Remote(error));
    }

    validate_batch(texts.len(), &body.embeddings)?;
    Ok(body.embeddings)
  }
}

/// Check a provider response lines up with the batch we sent.
///
/// Misaligned output is unusable: there is no safe way to re-derive which
/// row belongs to which record, so every check here is fatal for the run.
pub fn validate_batch(sent: usize, rows: &[Vec<f32>]) -> Result<(), ProviderError> {
  if rows.len() != sent {
    return Err(ProviderError::CountMismatch { sent, received: rows.len() });
  }

  let expected = rows.first().map(|row| row.len()).unwrap_or(0);
  for (row, vector) in rows.iter().enumerate() {
    if vector.len() != expected {
      return Err(ProviderError::DimensionMismatch { row, got: vector.len(), expected });
    }
    if vector.iter().any(|v| !v.is_finite()) {
      return Err(ProviderError::NonFinite { row });
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_validate_batch_accepts_aligned_output() {
    let rows = vec![vec![0.6, 0.8], vec![1.0, 0.0]];
    assert!(validate_batch(2, &rows).is_ok());
  }

  #[test]
  fn test_validate_batch_rejects_count_mismatch() {
    let rows = vec![vec![1.0, 0.0]];
    let err = validate_batch(2, &rows).unwrap_err();
    assert!(matches!(err, ProviderError::CountMismatch { sent: 2, received: 1 }));
  }

  #[test]
  fn test_validate_batch_rejects_ragged_rows() {
    let rows = vec![vec![1.0, 0.0], vec![0.5]];
    let err = validate_batch(2, &rows).unwrap_err();
    assert!(matches!(err, ProviderError::DimensionMismatch { row: 1, .. }));
  }

  #[test]
  fn test_validate_batch_rejects_non_finite_components() {
    let rows = vec![vec![1.0, 0.0], vec![f32::NAN, 1.0]];
    let err = validate_batch(2, &rows).unwrap_err();
    assert!(matches!(err, ProviderError::NonFinite { row: 1 }));
  }

  #[test]
  fn test_validate_batch_empty_is_aligned() {
    assert!(validate_batch(0, &[]).is_ok());
  }
}
