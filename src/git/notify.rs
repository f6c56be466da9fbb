use tracing::warn;

/// Receives human-readable diagnostics that must reach the user, such as
/// messages a remote attached to an otherwise successful push.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Default notifier: forwards everything to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str) {
        warn!(target: "orgsync::notify", "{}", message);
    }
}
