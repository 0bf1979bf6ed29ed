use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] coinlens_core::ValidationError),

    #[error(transparent)]
    Enrich(#[from] coinlens_core::EnrichError),

    #[error("source error: {0}")]
    Source(#[from] coinlens_core::SourceError),

    #[error(transparent)]
    Store(#[from] coinlens_store::StoreError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<coinlens_core::PortfolioError> for CliError {
    fn from(error: coinlens_core::PortfolioError) -> Self {
        use coinlens_core::PortfolioError;
        match error {
            PortfolioError::Validation(inner) => Self::Validation(inner),
            PortfolioError::Enrich(inner) => Self::Enrich(inner),
            PortfolioError::Source(inner) => Self::Source(inner),
        }
    }
}

impl CliError {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) | Self::Enrich(_) => 2,
            Self::Source(_) => 3,
            Self::Store(_) | Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}
