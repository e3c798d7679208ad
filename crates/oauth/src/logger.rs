use serde_json::Value;

/// Sink for non-fatal diagnostics of the callback flow.
pub trait AuthLogger: Send + Sync {
    fn debug(&self, event: &str, data: &Value);
    fn error(&self, error: &(dyn std::error::Error + 'static));
}

/// Forwards to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl AuthLogger for TracingLogger {
    fn debug(&self, event: &str, data: &Value) {
        tracing::debug!(event, data = %data, "auth diagnostic");
    }

    fn error(&self, error: &(dyn std::error::Error + 'static)) {
        tracing::error!(error = %error, "auth error");
    }
}
