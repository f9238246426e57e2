use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("tier table must contain at least one tier")]
    EmptyTierTable,

    #[error("tier '{next}' must start above tier '{previous}'")]
    UnorderedTiers { previous: String, next: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The text provider answered, but not with usable insights.
    #[error("insight provider error: {0}")]
    InsightProvider(String),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
