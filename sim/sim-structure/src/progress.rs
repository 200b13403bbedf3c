//! Progress reporting for long-running passes.
//!
//! The synthesizer never talks to a UI directly; it reports the completed
//! fraction of outer iterations to a [`ProgressSink`] supplied by the caller.

use crate::synth::SynthesisReport;
use tracing::{debug, info};

/// Receiver for run progress.
pub trait ProgressSink {
    /// Completed fraction in `[0, 1]`, reported after each outer iteration.
    fn progress(&mut self, fraction: f64);

    /// Called once when a run ends with its report.
    fn finished(&mut self, _report: &SynthesisReport) {}
}

/// Discards all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn progress(&mut self, _fraction: f64) {}
}

/// Emits progress as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn progress(&mut self, fraction: f64) {
        debug!(percent = format_args!("{:.2}", fraction * 100.0), "progress");
    }

    fn finished(&mut self, report: &SynthesisReport) {
        info!(%report, "structure run finished");
    }
}

/// Forwards progress to a closure.
///
/// # Example
///
/// ```
/// use sim_structure::{FnProgress, ProgressSink};
///
/// let mut seen = Vec::new();
/// {
///     let mut sink = FnProgress::new(|f| seen.push(f));
///     sink.progress(0.5);
///     sink.progress(1.0);
/// }
/// assert_eq!(seen, vec![0.5, 1.0]);
/// ```
pub struct FnProgress<F: FnMut(f64)> {
    callback: F,
}

impl<F: FnMut(f64)> FnProgress<F> {
    /// Wrap a closure.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F: FnMut(f64)> ProgressSink for FnProgress<F> {
    fn progress(&mut self, fraction: f64) {
        (self.callback)(fraction);
    }
}

impl<F: FnMut(f64)> std::fmt::Debug for FnProgress<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProgress").finish_non_exhaustive()
    }
}
