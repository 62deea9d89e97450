use crate::models::match_record::{Match, MatchStatus};
use crate::repositories::errors::match_repository_errors::MatchRepositoryError;
use crate::services::clock_service::Clock;
use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Duration, Utc};
use serde_dynamo::{from_item, to_attribute_value, to_item};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[cfg(test)]
use mockall::automock;

/// Extra time a record survives past `expiresAt` before the store drops it.
pub const RECLAIM_GRACE_SECONDS: i64 = 60;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait MatchRepository: Send + Sync {
    /// Stores a new match. Fails with `AlreadyExists` when the code is taken.
    async fn create_match(&self, record: &Match) -> Result<(), MatchRepositoryError>;
    async fn get_match(&self, match_code: &str) -> Result<Option<Match>, MatchRepositoryError>;
    async fn save_match(&self, record: &Match) -> Result<(), MatchRepositoryError>;
    async fn delete_match(&self, match_code: &str) -> Result<(), MatchRepositoryError>;
    async fn find_by_connection(
        &self,
        connection_id: &str,
    ) -> Result<Vec<Match>, MatchRepositoryError>;
    /// Waiting matches whose join window closed at or before `now`.
    async fn find_expired_waiting(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Match>, MatchRepositoryError>;
    /// Active matches with a running clock.
    async fn find_running_clocks(&self) -> Result<Vec<Match>, MatchRepositoryError>;
}

fn references_connection(record: &Match, connection_id: &str) -> bool {
    record.player_by_connection(connection_id).is_some()
}

fn has_running_clock(record: &Match) -> bool {
    record.status == MatchStatus::Active && record.active_turn_started_at.is_some()
}

pub struct DynamoDbMatchRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbMatchRepository {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    fn to_record_item(
        record: &Match,
    ) -> Result<HashMap<String, AttributeValue>, MatchRepositoryError> {
        let mut item: HashMap<String, AttributeValue> =
            to_item(record).map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?;
        let ttl = record.expires_at.timestamp() + RECLAIM_GRACE_SECONDS;
        item.insert("ttl".to_string(), AttributeValue::N(ttl.to_string()));
        Ok(item)
    }

    /// Scans the whole table, optionally keeping only one status.
    async fn scan(&self, status: Option<&str>) -> Result<Vec<Match>, MatchRepositoryError> {
        let mut records = Vec::new();
        let mut start_key = None;

        loop {
            let mut request = self
                .client
                .scan()
                .table_name(&self.table_name)
                .set_exclusive_start_key(start_key);

            if let Some(status) = status {
                request = request
                    .filter_expression("#status = :status")
                    .expression_attribute_names("#status", "status")
                    .expression_attribute_values(":status", AttributeValue::S(status.to_string()));
            }

            let output = request
                .send()
                .await
                .map_err(|e| MatchRepositoryError::DynamoDb(e.to_string()))?;

            for item in output.items.unwrap_or_default() {
                let record: Match = from_item(item)
                    .map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?;
                records.push(record);
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl MatchRepository for DynamoDbMatchRepository {
    async fn create_match(&self, record: &Match) -> Result<(), MatchRepositoryError> {
        let item = Self::to_record_item(record)?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(matchCode)")
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_conditional_check_failed_exception() {
                    MatchRepositoryError::AlreadyExists
                } else {
                    MatchRepositoryError::DynamoDb(service_error.to_string())
                }
            })?;

        Ok(())
    }

    async fn get_match(&self, match_code: &str) -> Result<Option<Match>, MatchRepositoryError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(
                "matchCode",
                to_attribute_value(match_code)
                    .map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?,
            )
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| MatchRepositoryError::DynamoDb(e.to_string()))?;

        match output.item {
            Some(item) => {
                let record: Match = from_item(item)
                    .map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn save_match(&self, record: &Match) -> Result<(), MatchRepositoryError> {
        let item = Self::to_record_item(record)?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_exists(matchCode)")
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_conditional_check_failed_exception() {
                    MatchRepositoryError::NotFound
                } else {
                    MatchRepositoryError::DynamoDb(service_error.to_string())
                }
            })?;

        Ok(())
    }

    async fn delete_match(&self, match_code: &str) -> Result<(), MatchRepositoryError> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key(
                "matchCode",
                to_attribute_value(match_code)
                    .map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?,
            )
            .send()
            .await
            .map_err(|e| MatchRepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }

    async fn find_by_connection(
        &self,
        connection_id: &str,
    ) -> Result<Vec<Match>, MatchRepositoryError> {
        Ok(self
            .scan(None)
            .await?
            .into_iter()
            .filter(|record| references_connection(record, connection_id))
            .collect())
    }

    async fn find_expired_waiting(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Match>, MatchRepositoryError> {
        Ok(self
            .scan(Some("waiting"))
            .await?
            .into_iter()
            .filter(|record| record.join_window_elapsed(now))
            .collect())
    }

    async fn find_running_clocks(&self) -> Result<Vec<Match>, MatchRepositoryError> {
        Ok(self
            .scan(Some("active"))
            .await?
            .into_iter()
            .filter(has_running_clock)
            .collect())
    }
}

/// Process-local store. Records disappear `RECLAIM_GRACE_SECONDS` after
/// their `expiresAt`, the way a TTL-enabled table drops items.
pub struct InMemoryMatchRepository {
    records: RwLock<HashMap<String, Match>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryMatchRepository {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            clock,
        }
    }

    fn is_live(&self, record: &Match, now: DateTime<Utc>) -> bool {
        record.expires_at + Duration::seconds(RECLAIM_GRACE_SECONDS) > now
    }

    async fn live_records(&self) -> Vec<Match> {
        let now = self.clock.now();
        let mut records = self.records.write().await;
        records.retain(|_, record| self.is_live(record, now));
        records.values().cloned().collect()
    }
}

#[async_trait]
impl MatchRepository for InMemoryMatchRepository {
    async fn create_match(&self, record: &Match) -> Result<(), MatchRepositoryError> {
        let now = self.clock.now();
        let mut records = self.records.write().await;

        if let Some(existing) = records.get(&record.match_code) {
            if self.is_live(existing, now) {
                return Err(MatchRepositoryError::AlreadyExists);
            }
        }

        records.insert(record.match_code.clone(), record.clone());
        Ok(())
    }

    async fn get_match(&self, match_code: &str) -> Result<Option<Match>, MatchRepositoryError> {
        let now = self.clock.now();
        let mut records = self.records.write().await;

        let record = match records.get(match_code) {
            Some(record) => record.clone(),
            None => return Ok(None),
        };

        if self.is_live(&record, now) {
            Ok(Some(record))
        } else {
            records.remove(match_code);
            Ok(None)
        }
    }

    async fn save_match(&self, record: &Match) -> Result<(), MatchRepositoryError> {
        let mut records = self.records.write().await;

        match records.get_mut(&record.match_code) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(MatchRepositoryError::NotFound),
        }
    }

    async fn delete_match(&self, match_code: &str) -> Result<(), MatchRepositoryError> {
        self.records.write().await.remove(match_code);
        Ok(())
    }

    async fn find_by_connection(
        &self,
        connection_id: &str,
    ) -> Result<Vec<Match>, MatchRepositoryError> {
        Ok(self
            .live_records()
            .await
            .into_iter()
            .filter(|record| references_connection(record, connection_id))
            .collect())
    }

    async fn find_expired_waiting(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Match>, MatchRepositoryError> {
        Ok(self
            .live_records()
            .await
            .into_iter()
            .filter(|record| record.join_window_elapsed(now))
            .collect())
    }

    async fn find_running_clocks(&self) -> Result<Vec<Match>, MatchRepositoryError> {
        Ok(self
            .live_records()
            .await
            .into_iter()
            .filter(has_running_clock)
            .collect())
    }
}
