use std::fmt::{Display, Formatter};

use crate::{Interval, ProviderId, RawBar, Token};

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    InvalidRequest,
    Transport,
    MalformedResponse,
    Internal,
}

/// Structured error returned by market-data source adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
}

impl SourceError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Transport,
            message: message.into(),
        }
    }

    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::MalformedResponse,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Transport => "source.transport",
            SourceErrorKind::MalformedResponse => "source.malformed_response",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Request payload for the klines endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KlinesRequest {
    pub token: Token,
    pub interval: Interval,
    pub limit: usize,
}

impl KlinesRequest {
    pub fn new(token: Token, interval: Interval, limit: usize) -> Result<Self, SourceError> {
        if limit == 0 {
            return Err(SourceError::invalid_request(
                "klines request limit must be greater than zero",
            ));
        }
        Ok(Self {
            token,
            interval,
            limit,
        })
    }
}

/// Market-data source contract.
///
/// Implementations are synchronous and retry-free; callers receive the raw
/// bars in exchange order (ascending open time).
pub trait MarketDataSource {
    fn id(&self) -> ProviderId;
    fn klines(&self, req: &KlinesRequest) -> Result<Vec<RawBar>, SourceError>;
}
