use thiserror::Error;

/// Bybit retCodes that mean "try again later" rather than "request is wrong".
const TRANSIENT_RET_CODES: &[i64] = &[
    10000, // server timeout
    10006, // too many visits
    10016, // server error
    10429, // system-level frequency protection
];

/// Every failure the bot can run into, split by what the caller should do about it.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("exchange rejected request ({code}): {message}")]
    ApiRejected { code: i64, message: String },

    #[error("malformed exchange response: {0}")]
    Decode(String),

    #[error("order validation failed: {0}")]
    ValidationFailed(String),

    #[error("insufficient {asset} balance")]
    InsufficientBalance { asset: String },

    #[error("configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("bot is already running")]
    AlreadyRunning,
}

impl BotError {
    /// Whether retrying the same request later can succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            BotError::Network(_) => true,
            BotError::HttpStatus { status, .. } => *status == 429 || (500..=599).contains(status),
            BotError::ApiRejected { code, .. } => TRANSIENT_RET_CODES.contains(code),
            _ => false,
        }
    }

    pub fn rejected(code: i64, message: impl Into<String>) -> Self {
        BotError::ApiRejected {
            code,
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        BotError::Decode(message.into())
    }
}

impl From<serde_json::Error> for BotError {
    fn from(e: serde_json::Error) -> Self {
        BotError::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
