use thiserror::Error;

/// Fatal failures of the embedding provider; a run never writes after one
#[derive(Debug, Error)]
pub enum ProviderError {
  #[error("embedding endpoint unreachable: {0}")]
  Unreachable(String),

  #[error("embedding provider returned an error: {0}")]
  Remote(String),

  #[error("malformed embedding response: {0}")]
  Malformed(String),

  #[error("embedding count mismatch: sent {sent} texts, received {received} rows")]
  CountMismatch { sent: usize, received: usize },

  #[error("embedding dimension mismatch: row {row} has {got} components, expected {expected}")]
  DimensionMismatch { row: usize, got: usize, expected: usize },

  #[error("embedding row {row} contains a non-finite component")]
  NonFinite { row: usize },
}

/// Fatal failures of the clusterer; a run never writes after one
#[derive(Debug, Error)]
pub enum ClusterError {
  #[error("nothing to cluster: the input matrix is empty")]
  EmptyInput,

  #[error("vector {row} has {got} components, expected {expected}")]
  DimensionMismatch { row: usize, got: usize, expected: usize },

  #[error("vector {row} contains a non-finite component")]
  NonFinite { row: usize },

  #[error("invalid cluster parameter: {0}")]
  InvalidParameter(String),
}

impl ClusterError {
  pub fn invalid_parameter(message: impl Into<String>) -> Self {
    Self::InvalidParameter(message.into())
  }
}

/// Connectivity-class storage failures. Per-item write failures are not
/// errors: they surface as skipped entries in the sync outcome.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("could not determine a home directory for the default store root")]
  NoHome,

  #[error("record store root {path} is not accessible: {source}")]
  RootUnavailable {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to read record store: {0}")]
  Read(#[from] std::io::Error),

  #[error("record {id} is not valid JSON: {source}")]
  Corrupt {
    id: String,
    #[source]
    source: serde_json::Error,
  },
}

/// Run-level error: any of these aborts before (or instead of) the write step
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("no records to process; the store snapshot is empty")]
  EmptyInput,

  #[error(transparent)]
  Provider(#[from] ProviderError),

  #[error(transparent)]
  Cluster(#[from] ClusterError),

  #[error(transparent)]
  Store(#[from] StoreError),
}
