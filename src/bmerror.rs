use tokio_tungstenite::tungstenite;

pub type BMResult<T> = Result<T, BMError>;

#[derive(Debug, thiserror::Error)]
pub enum BMError {
  #[error("HTTP transport failed: {0}")]
  Http(#[from] reqwest::Error),
  #[error("event socket failed: {0}")]
  WebSocket(#[from] tungstenite::Error),
  #[error("bad JSON: {0}")]
  Json(#[from] serde_json::Error),
  #[error("reply from {endpoint} is not {expected}")]
  UnexpectedShape { endpoint: String, expected: &'static str },
  #[error("reply from {endpoint} has no field {field}")]
  MissingField { endpoint: String, field: String },
  #[error("no drive at working set index {index} ({available} drives)")]
  NoSuchDrive { index: usize, available: usize },
  #[error("sending to a closed channel")]
  AsyncChannelClosed,
}
