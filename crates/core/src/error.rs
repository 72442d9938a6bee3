#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Malformed action payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}
