//! Domain models for feedback analysis.
//!
//! # Core Concepts
//!
//! - [`FeedbackRecord`]: One classified feedback line. The text is fixed once
//!   created; labels and the incorrect flag are edited during review.
//! - [`ClassifiedItem`]: One `{feedback, labels}` entry exactly as the
//!   classification service returned it.
//! - [`LabelCount`]: A derived (normalized label, count) pair. Never stored.
//! - [`AnalysisSession`]: The records of one analysis run. Owned by whichever
//!   controller started the run, held in memory only.

mod record;
mod session;

pub use record::*;
pub use session::*;
