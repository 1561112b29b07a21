//! Component health for degraded-mode reporting.
//!
//! Collaborators behind a Store can fail without stopping it: a missing
//! ticket list or an unwritable disk leaves the session running with weaker
//! guarantees. Each such collaborator is summarized as a [`HealthCheck`] and
//! a [`HealthReport`] rolls them up to the worst status.

use chrono::{DateTime, Utc};
use std::fmt;

/// Ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthStatus {
    /// Working normally
    Healthy,
    /// Working, with reduced guarantees
    Degraded,
}

impl HealthStatus {
    /// `Healthy`?
    #[must_use]
    pub const fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// `Degraded`?
    #[must_use]
    pub const fn is_degraded(self) -> bool {
        matches!(self, Self::Degraded)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
        })
    }
}

/// Status of one named component, with optional detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheck {
    /// Component name, stable across reports
    pub component: String,
    /// Current status
    pub status: HealthStatus,
    /// Why it is not healthy
    pub message: Option<String>,
    /// Extra facts, in insertion order
    pub metadata: Vec<(String, String)>,
}

impl HealthCheck {
    fn with_status(component: impl Into<String>, status: HealthStatus, message: Option<String>) -> Self {
        Self {
            component: component.into(),
            status,
            message,
            metadata: Vec::new(),
        }
    }

    /// Component working normally.
    #[must_use]
    pub fn healthy(component: impl Into<String>) -> Self {
        Self::with_status(component, HealthStatus::Healthy, None)
    }

    /// Component working with reduced guarantees, for `reason`.
    #[must_use]
    pub fn degraded(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::with_status(component, HealthStatus::Degraded, Some(reason.into()))
    }

    /// Attach a `key=value` fact.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for HealthCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.component, self.status)?;
        if let Some(reason) = &self.message {
            write!(f, " ({reason})")?;
        }
        for (key, value) in &self.metadata {
            write!(f, " {key}={value}")?;
        }
        Ok(())
    }
}

/// Checks taken together at one instant.
#[derive(Debug, Clone)]
pub struct HealthReport {
    /// Worst status among `checks`, `Healthy` when there are none
    pub status: HealthStatus,
    /// Individual checks
    pub checks: Vec<HealthCheck>,
    /// When the checks were taken
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    /// Roll `checks` up into a report stamped `timestamp`.
    #[must_use]
    pub fn at(checks: Vec<HealthCheck>, timestamp: DateTime<Utc>) -> Self {
        let status = checks
            .iter()
            .map(|check| check.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);

        Self {
            status,
            checks,
            timestamp,
        }
    }

    /// Every component healthy?
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        self.status.is_healthy()
    }

    /// Any component degraded?
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.status.is_degraded()
    }

    /// The check for `component`, if present.
    #[must_use]
    pub fn check(&self, component: &str) -> Option<&HealthCheck> {
        self.checks.iter().find(|check| check.component == component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noon() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T12:00:00Z")
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_default()
    }

    #[test]
    fn degraded_check_renders_reason_and_metadata() {
        let check = HealthCheck::degraded("ticket_source", "tickets.json missing")
            .with_metadata("valid_codes", "0");

        assert!(check.status.is_degraded());
        assert_eq!(
            check.to_string(),
            "ticket_source: degraded (tickets.json missing) valid_codes=0"
        );
    }

    #[test]
    fn healthy_check_renders_bare() {
        assert_eq!(HealthCheck::healthy("used_ticket_store").to_string(), "used_ticket_store: healthy");
    }

    #[test]
    fn report_takes_worst_status() {
        let report = HealthReport::at(
            vec![HealthCheck::healthy("a"), HealthCheck::degraded("b", "slow")],
            noon(),
        );

        assert!(report.is_degraded());
        assert_eq!(report.timestamp, noon());
        assert_eq!(report.check("b").map(|c| c.status), Some(HealthStatus::Degraded));
        assert!(report.check("missing").is_none());
    }

    #[test]
    fn empty_report_is_healthy() {
        assert!(HealthReport::at(Vec::new(), noon()).is_healthy());
    }
}
