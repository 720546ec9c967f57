//! Operator notifications as log lines

use super::{Notification, Notifier, Severity};
use tracing::{error, info, warn};

/// Notifier that writes each notification to the tracing log
///
/// The session engine also appends escalations and failures to the event
/// stream, so the web UI shows them without a desktop notification daemon.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: &Notification) {
        match n.severity {
            Severity::Info => info!(title = %n.title, timeout_secs = n.timeout_secs, "{}", n.message),
            Severity::Warning => warn!(title = %n.title, timeout_secs = n.timeout_secs, "{}", n.message),
            Severity::Critical => error!(title = %n.title, timeout_secs = n.timeout_secs, "{}", n.message),
        }
    }
}
