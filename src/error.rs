use thiserror::Error;

/// Failures of a single outbound fetch. Callers in the discovery path treat
/// all of these as "nothing here" and move on.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                source: err,
            }
        }
    }
}

/// Errors from the LLM endpoint (classification, generation, embeddings).
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("llm endpoint returned status {0}")]
    Status(u16),

    #[error("malformed llm response: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Malformed(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("embedding failed: {0}")]
    Embedding(#[from] LlmError),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        StoreError::Other(format!("{:#}", err))
    }
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid site url: {0}")]
    InvalidUrl(String),

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("failed to store results: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("similarity search failed: {0}")]
    Store(#[from] StoreError),

    #[error("answer generation failed: {0}")]
    Generation(#[from] LlmError),
}
