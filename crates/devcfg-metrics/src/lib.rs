//! Metrics infrastructure for devcfg.
//!
//! This crate declares every metric the service emits as a structured
//! [`Metric`] constant and re-exports the `metrics` crate for convenience.
//! Without an installed recorder the `metrics` macros are no-ops, so
//! emitting is always safe.
//!
//! # Example
//!
//! ```rust,ignore
//! use devcfg_metrics::{MetricLabels, metric_defs, describe_metrics};
//!
//! describe_metrics();
//!
//! let labels = MetricLabels::new("telnet", "console");
//! metrics::counter!(metric_defs::CONNECTIONS_ACCEPTED.name, &labels.to_labels()).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, Unit};

/// Whether a metric counts events or tracks a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A level that can go up and down.
    Gauge,
}

impl MetricKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration with its metadata.
///
/// ```rust
/// use devcfg_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const LINES: Metric = Metric::counter("devcfg.console.lines")
///     .with_description("Lines received")
///     .with_unit(Unit::Count)
///     .with_labels(&["server"]);
///
/// assert_eq!(LINES.name, "devcfg.console.lines");
/// assert_eq!(LINES.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "devcfg.server.accepted").
    pub name: &'static str,
    /// Counter or gauge.
    pub kind: MetricKind,
    /// Human-readable description of the metric.
    pub description: &'static str,
    /// The unit of measurement (optional).
    pub unit: Option<Unit>,
    /// Expected label keys for this metric.
    pub labels: &'static [&'static str],
}

impl Metric {
    /// Creates a new counter metric with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    /// Creates a new gauge metric with the given name.
    pub const fn gauge(name: &'static str) -> Self {
        Self::new(name, MetricKind::Gauge)
    }

    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Sets the description for the metric.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit for the metric.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys for the metric.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the metrics recorder.
    ///
    /// This should be called once at startup for each metric.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions for the service.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Labels present on every listener-scoped metric.
    pub const SERVER_LABELS: &[&str] = &["server", "kind"];

    // ========================================================================
    // Listener Lifecycle
    // ========================================================================

    /// Clients accepted as the active session.
    pub const CONNECTIONS_ACCEPTED: Metric = Metric::counter("devcfg.server.accepted")
        .with_description("Clients accepted as the active session")
        .with_unit(Unit::Count)
        .with_labels(SERVER_LABELS);

    /// Clients turned away because a session was already active.
    pub const CONNECTIONS_REJECTED: Metric = Metric::counter("devcfg.server.rejected")
        .with_description("Clients rejected while a session was active")
        .with_unit(Unit::Count)
        .with_labels(SERVER_LABELS);

    /// Sessions ended, by explicit close or detected loss.
    pub const CONNECTIONS_CLOSED: Metric = Metric::counter("devcfg.server.closed")
        .with_description("Sessions ended")
        .with_unit(Unit::Count)
        .with_labels(SERVER_LABELS);

    /// Whether the listener currently has a client (0 or 1).
    pub const ACTIVE_CLIENTS: Metric = Metric::gauge("devcfg.server.active_clients")
        .with_description("Active clients on the listener")
        .with_unit(Unit::Count)
        .with_labels(SERVER_LABELS);

    // ========================================================================
    // Command Interpreter
    // ========================================================================

    /// Command lines dispatched to a leaf handler.
    pub const COMMANDS_DISPATCHED: Metric = Metric::counter("devcfg.cli.dispatched")
        .with_description("Command lines dispatched to a handler")
        .with_unit(Unit::Count)
        .with_labels(&["command"]);

    /// Command lines matching no root command.
    pub const COMMANDS_UNKNOWN: Metric = Metric::counter("devcfg.cli.unknown")
        .with_description("Command lines matching no command")
        .with_unit(Unit::Count);

    /// Lines discarded for exceeding the line buffer.
    pub const LINES_OVERLENGTH: Metric = Metric::counter("devcfg.cli.overlength")
        .with_description("Lines discarded for exceeding the line buffer")
        .with_unit(Unit::Count)
        .with_labels(SERVER_LABELS);

    // ========================================================================
    // Serial Bridge
    // ========================================================================

    /// Bytes forwarded by the bridge.
    ///
    /// Labels: server, kind, direction (`to_serial` / `to_client`)
    pub const BRIDGE_BYTES: Metric = Metric::counter("devcfg.bridge.bytes")
        .with_description("Bytes forwarded between client and serial port")
        .with_unit(Unit::Bytes)
        .with_labels(&["server", "kind", "direction"]);

    /// All metrics, for bulk description.
    pub const ALL: &[&Metric] = &[
        &CONNECTIONS_ACCEPTED,
        &CONNECTIONS_REJECTED,
        &CONNECTIONS_CLOSED,
        &ACTIVE_CLIENTS,
        &COMMANDS_DISPATCHED,
        &COMMANDS_UNKNOWN,
        &LINES_OVERLENGTH,
        &BRIDGE_BYTES,
    ];
}

/// Labels identifying one listener.
///
/// ```rust
/// use devcfg_metrics::MetricLabels;
///
/// let labels = MetricLabels::new("uart", "bridge");
/// let label_vec = labels.to_labels();
/// assert_eq!(label_vec.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct MetricLabels {
    /// Listener name.
    pub server: String,
    /// Handler kind (console, bridge, http).
    pub kind: String,
}

impl MetricLabels {
    /// Creates labels for the given listener.
    pub fn new(server: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            kind: kind.into(),
        }
    }

    /// Converts the labels to the metrics crate label format.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![("server", self.server.clone()), ("kind", self.kind.clone())]
    }

    /// Returns labels with additional key-value pairs.
    pub fn with(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.extend(extra.iter().cloned());
        labels
    }
}

/// Registers descriptions for every metric in [`metric_defs::ALL`].
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

/// Installs a Prometheus exporter listening on `addr`.
#[cfg(feature = "prometheus")]
pub fn install_prometheus(
    addr: std::net::SocketAddr,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_labels() {
        let labels = MetricLabels::new("telnet", "console");
        let label_vec = labels.to_labels();
        assert!(label_vec.contains(&("server", "telnet".to_string())));
        assert!(label_vec.contains(&("kind", "console".to_string())));
    }

    #[test]
    fn test_with_extra_labels() {
        let labels = MetricLabels::new("uart", "bridge");
        let extended = labels.with(&[("direction", "to_serial".to_string())]);
        assert_eq!(extended.len(), 3);
        assert!(extended.contains(&("direction", "to_serial".to_string())));
    }

    #[test]
    fn test_metric_definitions() {
        assert_eq!(metric_defs::CONNECTIONS_ACCEPTED.name, "devcfg.server.accepted");
        assert_eq!(metric_defs::CONNECTIONS_ACCEPTED.kind, MetricKind::Counter);
        assert_eq!(metric_defs::ACTIVE_CLIENTS.kind, MetricKind::Gauge);
        assert_eq!(metric_defs::BRIDGE_BYTES.unit, Some(Unit::Bytes));
        assert_eq!(metric_defs::BRIDGE_BYTES.labels, &["server", "kind", "direction"]);
        assert_eq!(metric_defs::COMMANDS_UNKNOWN.labels, &[] as &[&str]);
    }

    #[test]
    fn test_all_metrics_count() {
        assert_eq!(metric_defs::ALL.len(), 8);
    }

    #[test]
    fn test_describe_without_recorder() {
        describe_metrics();
    }
}
