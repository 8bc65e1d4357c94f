use serde::{Deserialize, Serialize};

/// A single line of customer feedback with its assigned labels.
///
/// Records are created by the batch runner with `is_incorrect = false`.
/// During review the labels may be replaced wholesale and the flag toggled,
/// but `text` never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// The original feedback line.
    pub text: String,
    /// Labels in the order the classifier (or the reviewer) gave them.
    pub labels: Vec<String>,
    /// Set by the reviewer when the classification is wrong.
    #[serde(default)]
    pub is_incorrect: bool,
}

impl FeedbackRecord {
    pub fn new(text: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            text: text.into(),
            labels,
            is_incorrect: false,
        }
    }
}

impl From<ClassifiedItem> for FeedbackRecord {
    fn from(item: ClassifiedItem) -> Self {
        Self::new(item.feedback, item.labels)
    }
}

/// One entry of the classification service's JSON array response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedItem {
    pub feedback: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// How often a normalized label occurs across a set of records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

/// Input for editing a record during review.
///
/// Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRecordInput {
    /// Replaces the whole label list.
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    #[serde(default)]
    pub is_incorrect: Option<bool>,
}
