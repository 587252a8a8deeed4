use thiserror::Error;

/// Failure of a single outbound fetch. Never escapes the poller: every
/// variant ends up either logged or recorded as a `Failed` metric state.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("rpc: {0}")]
    Rpc(#[from] alloy::transports::TransportError),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api returned code {code}: {msg}")]
    Api { code: i64, msg: String },

    #[error("unexpected response shape: {0}")]
    Decode(String),

    #[error("missing field `{0}`")]
    Missing(&'static str),

    /// Request succeeded but the source has nothing to report.
    #[error("no data: {0}")]
    NoData(String),
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Decode(e.to_string())
    }
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;
