#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchRepositoryError {
    NotFound,
    AlreadyExists,
    Serialization(String),
    DynamoDb(String),
}

impl std::fmt::Display for MatchRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchRepositoryError::NotFound => write!(f, "Match not found"),
            MatchRepositoryError::AlreadyExists => write!(f, "Match code already in use"),
            MatchRepositoryError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            MatchRepositoryError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
        }
    }
}

impl std::error::Error for MatchRepositoryError {}
