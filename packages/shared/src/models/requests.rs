use serde::{Deserialize, Serialize};

/// A move as submitted by a client, in coordinate form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub from: String,
    pub to: String,
    pub promotion: Option<String>,
}

impl MoveRequest {
    pub fn new(from: &str, to: &str) -> Self {
        MoveRequest {
            from: from.to_string(),
            to: to.to_string(),
            promotion: None,
        }
    }

    pub fn with_promotion(from: &str, to: &str, promotion: &str) -> Self {
        MoveRequest {
            from: from.to_string(),
            to: to.to_string(),
            promotion: Some(promotion.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMatchRequest {
    pub name: String,
    pub time_control_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinMatchRequest {
    pub name: String,
    pub match_code: String,
}

/// Binds a transport connection to a player of a match.
#[derive(Debug, Clone)]
pub struct AttachRequest {
    pub match_code: String,
    pub name: String,
    pub connection_id: String,
    /// Register an unknown name as the second player instead of rejecting it.
    pub allow_auto_join_second: bool,
}
