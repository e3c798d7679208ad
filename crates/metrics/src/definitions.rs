//! Metric name and label definitions.

/// OAuth callback handling
pub mod oauth {
    /// Callbacks received, labelled by provider
    pub const CALLBACKS_TOTAL: &str = "warden_oauth_callbacks_total";
    /// Callbacks that produced tokens
    pub const CALLBACK_SUCCESS_TOTAL: &str = "warden_oauth_callback_success_total";
    /// Callbacks rejected with an error, labelled by provider and error type
    pub const CALLBACK_FAILURES_TOTAL: &str = "warden_oauth_callback_failures_total";
    /// End-to-end callback duration in seconds
    pub const CALLBACK_DURATION_SECONDS: &str = "warden_oauth_callback_duration_seconds";
    /// Profiles that could not be normalized (callback still succeeds)
    pub const PROFILE_PARSE_FAILURES_TOTAL: &str = "warden_oauth_profile_parse_failures_total";
    /// Authorization server metadata discovery requests
    pub const DISCOVERY_REQUESTS_TOTAL: &str = "warden_oauth_discovery_requests_total";
}

/// Common label keys
pub mod labels {
    pub const PROVIDER: &str = "provider";
    pub const ERROR_TYPE: &str = "error_type";
}

/// Histogram buckets
pub mod buckets {
    /// Callback duration: several outbound requests, 10ms to 30s
    pub const CALLBACK_DURATION: &[f64] = &[
        0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
    ];
}
