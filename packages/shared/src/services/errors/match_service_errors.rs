use serde::{Deserialize, Serialize};

use crate::repositories::errors::match_repository_errors::MatchRepositoryError;
use crate::services::errors::chess_service_errors::ChessServiceError;

pub const SERVER_ERROR_MESSAGE: &str = "Unexpected server error.";

/// Machine-readable error category sent to clients next to the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadRequest,
    NotFound,
    Gone,
    Full,
    Forbidden,
    Conflict,
    Unprocessable,
    Timeout,
    Capacity,
    ServerError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Gone => "GONE",
            ErrorCode::Full => "FULL",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::Unprocessable => "UNPROCESSABLE",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Capacity => "CAPACITY",
            ErrorCode::ServerError => "SERVER_ERROR",
        }
    }

    pub fn status_code(self) -> u16 {
        match self {
            ErrorCode::BadRequest => 400,
            ErrorCode::NotFound => 404,
            ErrorCode::Gone => 410,
            ErrorCode::Full => 409,
            ErrorCode::Forbidden => 403,
            ErrorCode::Conflict => 409,
            ErrorCode::Unprocessable => 422,
            ErrorCode::Timeout => 409,
            ErrorCode::Capacity => 503,
            ErrorCode::ServerError => 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchServiceError {
    ValidationError(String),
    NotFound,
    Gone(String),
    Full,
    Forbidden(String),
    Conflict(String),
    IllegalMove,
    Timeout,
    Capacity,
    RepositoryError(MatchRepositoryError),
    RulesEngineError(ChessServiceError),
}

impl MatchServiceError {
    pub fn code(&self) -> ErrorCode {
        match self {
            MatchServiceError::ValidationError(_) => ErrorCode::BadRequest,
            MatchServiceError::NotFound => ErrorCode::NotFound,
            MatchServiceError::Gone(_) => ErrorCode::Gone,
            MatchServiceError::Full => ErrorCode::Full,
            MatchServiceError::Forbidden(_) => ErrorCode::Forbidden,
            MatchServiceError::Conflict(_) => ErrorCode::Conflict,
            MatchServiceError::IllegalMove => ErrorCode::Unprocessable,
            MatchServiceError::Timeout => ErrorCode::Timeout,
            MatchServiceError::Capacity => ErrorCode::Capacity,
            MatchServiceError::RepositoryError(_) | MatchServiceError::RulesEngineError(_) => {
                ErrorCode::ServerError
            }
        }
    }

    /// Text safe to show to clients. Infrastructure details stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            MatchServiceError::ValidationError(msg)
            | MatchServiceError::Gone(msg)
            | MatchServiceError::Forbidden(msg)
            | MatchServiceError::Conflict(msg) => msg.clone(),
            MatchServiceError::NotFound => "Match not found.".to_string(),
            MatchServiceError::Full => "Match Full".to_string(),
            MatchServiceError::IllegalMove => "Illegal move.".to_string(),
            MatchServiceError::Timeout => "Time has expired for this game.".to_string(),
            MatchServiceError::Capacity => {
                "Unable to generate a unique match code. Try again.".to_string()
            }
            MatchServiceError::RepositoryError(_) | MatchServiceError::RulesEngineError(_) => {
                SERVER_ERROR_MESSAGE.to_string()
            }
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.code() == ErrorCode::ServerError
    }
}

impl std::fmt::Display for MatchServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchServiceError::RepositoryError(err) => write!(f, "Repository error: {}", err),
            MatchServiceError::RulesEngineError(err) => write!(f, "Rules engine error: {}", err),
            other => write!(f, "{}", other.client_message()),
        }
    }
}

impl std::error::Error for MatchServiceError {}

impl From<MatchRepositoryError> for MatchServiceError {
    fn from(err: MatchRepositoryError) -> Self {
        MatchServiceError::RepositoryError(err)
    }
}

impl From<ChessServiceError> for MatchServiceError {
    fn from(err: ChessServiceError) -> Self {
        match err {
            ChessServiceError::ValidationError(msg) => MatchServiceError::ValidationError(msg),
            ChessServiceError::IllegalMove(_) => MatchServiceError::IllegalMove,
            ChessServiceError::GameOver(_) => {
                MatchServiceError::Gone("Match has already ended.".to_string())
            }
            ChessServiceError::InvalidPosition(_) => MatchServiceError::RulesEngineError(err),
        }
    }
}
