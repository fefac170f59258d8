//! Progress reporting and cooperative cancellation.
//!
//! Long-running operations (validation runs, batch validation, tuning)
//! report through a [`ProgressSink`] and poll a [`CancellationToken`].

#![warn(missing_docs)]

pub mod tracker;
pub mod cancel;

pub use tracker::{LogProgress, NoopProgress, ProgressCounter, ProgressEvent, ProgressRecorder, ProgressSink};
pub use cancel::CancellationToken;
