//! Batch classification pipeline.
//!
//! Input lines are split into consecutive batches ([`plan_batches`]) and each
//! batch is sent to a [`Classifier`] as one newline-joined block. Batches run
//! strictly one after another: batch n+1 is not sent until batch n resolves.
//! Any failing batch aborts the whole run and nothing partial is returned.

mod batch;

pub use batch::*;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::models::ClassifiedItem;

/// Lines per classification call when the caller does not say otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 250;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors from a single classification call.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No API key configured for the classification service")]
    MissingApiKey,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: API key rejected")]
    Unauthorized,

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Classification service returned no content")]
    EmptyResponse,

    #[error("Unparsable classification response: {0}")]
    InvalidResponse(String),
}

/// A service that labels a block of newline-separated feedback lines.
///
/// Implementations are expected (but not required) to return one item per
/// input line, in input order.
pub trait Classifier: Send + Sync {
    fn classify_batch<'a>(
        &'a self,
        batch: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ClassifiedItem>, ClassifierError>>;
}

impl<C: Classifier + ?Sized> Classifier for std::sync::Arc<C> {
    fn classify_batch<'a>(
        &'a self,
        batch: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ClassifiedItem>, ClassifierError>> {
        (**self).classify_batch(batch)
    }
}

/// Errors that abort a whole classification run.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("No feedback text provided")]
    InputEmpty,

    #[error("Batch size must be greater than zero")]
    InvalidBatchSize,

    #[error("Classification failed on batch {}: {source}", .index + 1)]
    Batch {
        index: usize,
        #[source]
        source: ClassifierError,
    },

    #[error("Classification cancelled")]
    Cancelled,
}
