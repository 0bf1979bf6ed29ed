use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_TOKEN_LEN: usize = 20;

/// Normalized exchange token symbol, e.g. `BTCUSDT`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Token(String);

impl Token {
    /// Parse and normalize a token to uppercase.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyToken);
        }

        let normalized = trimmed.to_ascii_uppercase();
        let len = normalized.chars().count();
        if len > MAX_TOKEN_LEN {
            return Err(ValidationError::TokenTooLong {
                len,
                max: MAX_TOKEN_LEN,
            });
        }

        // Leading digits are legal on Binance (1INCHUSDT, 1000SATSUSDT).
        for (index, ch) in normalized.chars().enumerate() {
            if !ch.is_ascii_alphanumeric() {
                return Err(ValidationError::TokenInvalidChar { ch, index });
            }
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Token {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Token {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Token> for String {
    fn from(value: Token) -> Self {
        value.0
    }
}
