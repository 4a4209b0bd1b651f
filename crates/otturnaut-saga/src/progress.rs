/// Typed progress record sent to an optional subscriber before a step
/// begins. No ordering guarantee across distinct
/// deployments.
#[derive(Debug, Clone)]
pub enum Progress {
    Deployment { step: String, message: String },
    Undeploy { step: String, message: String },
    Build { phase: String, message: String },
}

/// A subscriber is just a sink for progress records; `None` means nobody is
/// listening. Kept as a trait object so callers can plug in a channel, a
/// logger, or a no-op.
pub trait ProgressSink: Send + Sync {
    fn notify(&self, progress: Progress);
}

/// The default sink: every progress record is logged at debug and otherwise
/// discarded.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn notify(&self, progress: Progress) {
        tracing::debug!(?progress, "progress (no subscriber attached)");
    }
}
