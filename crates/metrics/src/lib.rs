//! Metrics for warden.
//!
//! Instrumentation goes through the `metrics` crate facade, so recording is a
//! no-op until a recorder is installed. With the `prometheus` feature,
//! [`init_metrics`] installs a Prometheus recorder and returns a handle that
//! renders the text exposition format.
//!
//! ```rust,ignore
//! use warden_metrics::{counter, labels, oauth};
//!
//! counter!(oauth::CALLBACKS_TOTAL, labels::PROVIDER => "okta").increment(1);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

pub use metrics::{counter, gauge, histogram};
