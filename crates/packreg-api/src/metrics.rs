//! # Registry Metrics
//!
//! Counters recorded through the `metrics` facade and rendered by the
//! Prometheus recorder at `GET /metrics`.
//!
//! ## Metrics Exported
//!
//! - `packreg_versions_published_total` - committed publishes, labeled by
//!   whether the publish promoted the pack
//! - `packreg_publish_conflicts_total` - publishes refused with
//!   `VERSION_CONFLICT`
//! - `packreg_licenses_issued_total` - licenses minted, labeled by tier
//! - `packreg_downloads_denied_total` - downloads refused, labeled by reason
//!
//! Without an installed recorder every call is a no-op.

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use packreg_core::Tier;

pub const VERSIONS_PUBLISHED: &str = "packreg_versions_published_total";
pub const PUBLISH_CONFLICTS: &str = "packreg_publish_conflicts_total";
pub const LICENSES_ISSUED: &str = "packreg_licenses_issued_total";
pub const DOWNLOADS_DENIED: &str = "packreg_downloads_denied_total";

/// Install the process-wide Prometheus recorder.
///
/// Fails if a recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_counter!(VERSIONS_PUBLISHED, "Versions committed by the publish transaction");
    describe_counter!(PUBLISH_CONFLICTS, "Publishes refused because the version exists");
    describe_counter!(LICENSES_ISSUED, "License tokens minted on download");
    describe_counter!(DOWNLOADS_DENIED, "Downloads refused before content was served");
    Ok(handle)
}

pub fn record_version_published(promoted: bool) {
    counter!(VERSIONS_PUBLISHED, "promoted" => promoted.to_string()).increment(1);
}

pub fn record_publish_conflict() {
    counter!(PUBLISH_CONFLICTS).increment(1);
}

pub fn record_license_issued(tier: Tier) {
    counter!(LICENSES_ISSUED, "tier" => tier.as_str()).increment(1);
}

/// `reason` is a stable code such as `tier_insufficient`.
pub fn record_download_denied(reason: &'static str) {
    counter!(DOWNLOADS_DENIED, "reason" => reason).increment(1);
}
