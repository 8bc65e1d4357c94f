use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{Classifier, ClassifyError, DEFAULT_BATCH_SIZE};
use crate::models::FeedbackRecord;

/// A contiguous chunk of input lines sent in one classification call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub index: usize,
    pub line_count: usize,
    /// The lines joined with `\n`.
    pub text: String,
}

/// Split `lines` into consecutive batches of at most `batch_size` lines.
///
/// Order is preserved and only the last batch may be short. A zero
/// `batch_size` yields no batches.
pub fn plan_batches(lines: &[String], batch_size: usize) -> Vec<Batch> {
    if batch_size == 0 {
        return Vec::new();
    }
    lines
        .chunks(batch_size)
        .enumerate()
        .map(|(index, chunk)| Batch {
            index,
            line_count: chunk.len(),
            text: chunk.join("\n"),
        })
        .collect()
}

/// Progress of a classification run, reported between suspend points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    Started {
        total_lines: usize,
        total_batches: usize,
    },
    BatchStarted {
        index: usize,
        total: usize,
        lines: usize,
    },
    BatchFinished {
        index: usize,
        total: usize,
        received: usize,
    },
    /// The classifier returned a different number of items than lines sent.
    /// The items are kept as returned.
    CountMismatch {
        index: usize,
        sent: usize,
        received: usize,
    },
    Finished {
        records: usize,
    },
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started {
                total_lines,
                total_batches,
            } => write!(
                f,
                "Classifying {} lines in {} batch(es)",
                total_lines, total_batches
            ),
            Self::BatchStarted { index, total, lines } => {
                write!(f, "Sending batch {}/{} ({} lines)", index + 1, total, lines)
            }
            Self::BatchFinished {
                index,
                total,
                received,
            } => write!(
                f,
                "Batch {}/{} returned {} items",
                index + 1,
                total,
                received
            ),
            Self::CountMismatch {
                index,
                sent,
                received,
            } => write!(
                f,
                "Batch {} sent {} lines but received {} items",
                index + 1,
                sent,
                received
            ),
            Self::Finished { records } => write!(f, "Classification finished: {} records", records),
        }
    }
}

/// Result of a run that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifyOutcome {
    Records(Vec<FeedbackRecord>),
    /// Every call succeeded but nothing usable came back.
    Empty,
}

impl ClassifyOutcome {
    pub fn into_records(self) -> Vec<FeedbackRecord> {
        match self {
            Self::Records(records) => records,
            Self::Empty => Vec::new(),
        }
    }
}

/// Runs batches against a [`Classifier`] one at a time.
///
/// The runner keeps no state between runs; everything it produces is
/// returned from [`BatchRunner::run`].
pub struct BatchRunner<'a, C: Classifier + ?Sized> {
    classifier: &'a C,
    batch_size: usize,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a, C: Classifier + ?Sized> BatchRunner<'a, C> {
    pub fn new(classifier: &'a C) -> Self {
        Self {
            classifier,
            batch_size: DEFAULT_BATCH_SIZE,
            cancel: None,
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Abort the run once `flag` is set. Checked before each batch and again
    /// when each call resolves.
    pub fn cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Classify pre-filtered `lines`, reporting progress to `on_progress`.
    pub async fn run<F>(
        &self,
        lines: &[String],
        mut on_progress: F,
    ) -> Result<ClassifyOutcome, ClassifyError>
    where
        F: FnMut(&Progress),
    {
        if lines.is_empty() {
            return Err(ClassifyError::InputEmpty);
        }
        if self.batch_size == 0 {
            return Err(ClassifyError::InvalidBatchSize);
        }

        let batches = plan_batches(lines, self.batch_size);
        let total = batches.len();
        on_progress(&Progress::Started {
            total_lines: lines.len(),
            total_batches: total,
        });

        let mut records: Vec<FeedbackRecord> = Vec::with_capacity(lines.len());
        for batch in &batches {
            if self.cancelled() {
                tracing::info!("Classification cancelled before batch {}", batch.index + 1);
                return Err(ClassifyError::Cancelled);
            }

            let started = Progress::BatchStarted {
                index: batch.index,
                total,
                lines: batch.line_count,
            };
            tracing::info!("{}", started);
            on_progress(&started);

            let items = self
                .classifier
                .classify_batch(&batch.text)
                .await
                .map_err(|source| {
                    tracing::error!("Batch {} failed: {}", batch.index + 1, source);
                    ClassifyError::Batch {
                        index: batch.index,
                        source,
                    }
                })?;

            // An in-flight result is dropped if the run was cancelled meanwhile
            if self.cancelled() {
                tracing::info!("Classification cancelled during batch {}", batch.index + 1);
                return Err(ClassifyError::Cancelled);
            }

            if items.len() != batch.line_count {
                let mismatch = Progress::CountMismatch {
                    index: batch.index,
                    sent: batch.line_count,
                    received: items.len(),
                };
                tracing::warn!("{}", mismatch);
                on_progress(&mismatch);
            }

            on_progress(&Progress::BatchFinished {
                index: batch.index,
                total,
                received: items.len(),
            });
            records.extend(items.into_iter().map(FeedbackRecord::from));
        }

        on_progress(&Progress::Finished {
            records: records.len(),
        });

        if records.is_empty() {
            tracing::warn!("Classification returned no results");
            Ok(ClassifyOutcome::Empty)
        } else {
            Ok(ClassifyOutcome::Records(records))
        }
    }
}

/// Classify `lines` with the given batch size and no progress reporting.
pub async fn classify<C: Classifier + ?Sized>(
    classifier: &C,
    lines: &[String],
    batch_size: usize,
) -> Result<ClassifyOutcome, ClassifyError> {
    BatchRunner::new(classifier)
        .batch_size(batch_size)
        .run(lines, |_| {})
        .await
}
