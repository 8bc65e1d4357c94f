use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::record::{FeedbackRecord, LabelCount, UpdateRecordInput};
use crate::labels;

/// Errors raised by review edits.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Record {0} not found")]
    RecordNotFound(usize),
}

/// The records produced by one classification run.
///
/// Sessions are **ephemeral**: they exist for the duration of one analysis
/// and are never persisted. The controller that started the run owns the
/// session; the core functions only borrow its records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub records: Vec<FeedbackRecord>,
}

impl AnalysisSession {
    pub fn new(records: Vec<FeedbackRecord>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            records,
        }
    }

    /// Apply a review edit to the record at `index`.
    pub fn update_record(
        &mut self,
        index: usize,
        input: UpdateRecordInput,
    ) -> Result<&FeedbackRecord, SessionError> {
        let record = self
            .records
            .get_mut(index)
            .ok_or(SessionError::RecordNotFound(index))?;

        if let Some(labels) = input.labels {
            record.labels = labels;
        }
        if let Some(is_incorrect) = input.is_incorrect {
            record.is_incorrect = is_incorrect;
        }
        Ok(record)
    }

    /// Flip the incorrect-analysis flag on the record at `index`.
    pub fn toggle_incorrect(&mut self, index: usize) -> Result<&FeedbackRecord, SessionError> {
        let record = self
            .records
            .get_mut(index)
            .ok_or(SessionError::RecordNotFound(index))?;
        record.is_incorrect = !record.is_incorrect;
        Ok(record)
    }

    /// Label counts for the current state of the records.
    pub fn summary(&self) -> Vec<LabelCount> {
        labels::aggregate(&self.records)
    }

    pub fn incorrect_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_incorrect).count()
    }
}

/// Session listing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub record_count: usize,
    pub incorrect_count: usize,
}

impl From<&AnalysisSession> for SessionSummary {
    fn from(session: &AnalysisSession) -> Self {
        Self {
            id: session.id,
            created_at: session.created_at,
            record_count: session.records.len(),
            incorrect_count: session.incorrect_count(),
        }
    }
}

/// A session together with its current label counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub records: Vec<FeedbackRecord>,
    pub summary: Vec<LabelCount>,
}

impl From<&AnalysisSession> for SessionView {
    fn from(session: &AnalysisSession) -> Self {
        Self {
            id: session.id,
            created_at: session.created_at,
            records: session.records.clone(),
            summary: session.summary(),
        }
    }
}

/// Response to a record edit. The summary is recomputed after every edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordUpdateView {
    pub index: usize,
    pub record: FeedbackRecord,
    pub summary: Vec<LabelCount>,
}

/// Input for starting a new analysis session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSessionInput {
    /// Newline-separated feedback; blank lines are dropped.
    pub text: String,
    #[serde(default)]
    pub batch_size: Option<usize>,
    /// Replaces the configured system instruction for this run.
    #[serde(default)]
    pub system_instruction: Option<String>,
    #[serde(default)]
    pub suggested_labels: Vec<String>,
}

/// Returned instead of a session when classification succeeded but
/// produced nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmptyResultResponse {
    pub warning: String,
}
