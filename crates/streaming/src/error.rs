use foundation::CountryId;
use thiserror::Error;

/// Failure talking to the snapshot endpoints or the live channel.
///
/// Every variant is recovered inside the sync loop by retrying, backing off
/// or falling back to polling.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("could not decode response from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("live channel failed")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("live channel is not supported by this transport")]
    Unsupported,
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: std::time::Duration,
    },
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// A live frame that could not be turned into store updates. The frame is
/// dropped; the channel stays open.
#[derive(Debug, Error)]
pub enum MalformedMessage {
    #[error("frame is not a valid envelope: {0}")]
    Json(#[from] serde_json::Error),
    #[error("`{kind}` payload does not match the expected shape: {detail}")]
    Schema { kind: String, detail: String },
    #[error("country {id} has score {score} outside [0, 100]")]
    ScoreOutOfRange { id: CountryId, score: f64 },
}
