//! Recorder installation.

use anyhow::Result;

#[derive(Debug, Clone, Default)]
pub struct MetricsRecorderConfig {
    /// Install a Prometheus recorder. Ignored without the `prometheus` feature.
    pub enabled: bool,
}

/// Handle to the installed recorder.
#[derive(Clone)]
pub struct MetricsHandle {
    #[cfg(feature = "prometheus")]
    prometheus: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl std::fmt::Debug for MetricsHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsHandle")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl MetricsHandle {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        #[cfg(feature = "prometheus")]
        {
            self.prometheus.is_some()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            false
        }
    }

    /// Prometheus text exposition of all recorded metrics, if enabled.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        #[cfg(feature = "prometheus")]
        {
            self.prometheus.as_ref().map(|h| h.render())
        }
        #[cfg(not(feature = "prometheus"))]
        {
            None
        }
    }
}

/// Install the global metrics recorder. Must be called at most once per process.
pub fn init_metrics(config: &MetricsRecorderConfig) -> Result<MetricsHandle> {
    if !config.enabled {
        tracing::debug!("metrics disabled");
        return Ok(MetricsHandle {
            #[cfg(feature = "prometheus")]
            prometheus: None,
        });
    }

    #[cfg(feature = "prometheus")]
    {
        use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

        use crate::definitions::{buckets, oauth};

        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full(oauth::CALLBACK_DURATION_SECONDS.to_string()),
                buckets::CALLBACK_DURATION,
            )?
            .install_recorder()?;
        tracing::info!("prometheus metrics recorder installed");
        Ok(MetricsHandle {
            prometheus: Some(handle),
        })
    }

    #[cfg(not(feature = "prometheus"))]
    {
        tracing::warn!("metrics requested but the prometheus feature is not enabled");
        Ok(MetricsHandle {})
    }
}
