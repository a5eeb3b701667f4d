use thiserror::Error;

pub type CampaignResult<T> = Result<T, CampaignError>;

#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Campaign name error: {0}")]
    CampaignName(#[from] ParseError),

    #[error("Unknown currency code {code:?} (rate table {table_version})")]
    UnknownCurrency { code: String, table_version: String },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Order lifecycle violation for order {order_id}: {detail}")]
    OrderLifecycle { order_id: String, detail: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Failure to recover a merchant/affiliate identity from a campaign name.
///
/// Returned as a value so callers can surface it as a data-quality signal
/// on the report instead of aborting the batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("campaign name {name:?} has {found} token(s), need at least 2")]
    TooFewTokens { name: String, found: usize },

    #[error("campaign name {name:?} has an empty token at position {position}")]
    EmptyToken { name: String, position: usize },
}

impl From<config::ConfigError> for CampaignError {
    fn from(err: config::ConfigError) -> Self {
        CampaignError::Config(err.to_string())
    }
}
