//! Batch classification, review and spreadsheet export for customer feedback.
//!
//! Feedback lines are split into batches and sent to a text-generation
//! service ([`gemini::GeminiClassifier`]) through the [`classify::Classifier`]
//! seam. The returned records live in an [`models::AnalysisSession`] that a
//! controller (the CLI or the [`api`] server) owns and edits. Label summaries
//! come from [`labels::aggregate`] and spreadsheets from [`export`].

pub mod api;
pub mod classify;
pub mod config;
pub mod export;
pub mod gemini;
pub mod input;
pub mod labels;
pub mod models;
