//! End-of-run telemetry.
//!
//! The collector only builds and serializes the payload; actual delivery
//! goes through a registered `TelemetryTransport`. Failure to deliver is
//! logged at warn and never fails the run.

use serde::Serialize;

use crate::audit::AuditEvent;
use crate::capability::CapabilityRegistry;
use crate::stats::PipelineStats;

/// Metadata header attached to the audit array on delivery.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub version: String,
    pub platform: String,
    pub input_path: String,
    pub duration_ms: u64,
    pub stats: PipelineStats,
}

impl RunMetadata {
    pub fn new(input_path: &str, duration_ms: u64, stats: PipelineStats) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            platform: format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
            input_path: input_path.to_string(),
            duration_ms,
            stats,
        }
    }
}

/// Build the POST body: `{ "metadata": ..., "audit": [...] }`.
pub fn serialize_payload(metadata: &RunMetadata, audit: &[AuditEvent]) -> Option<String> {
    let payload = serde_json::json!({
        "metadata": metadata,
        "audit": audit,
    });
    serde_json::to_string(&payload).ok()
}

/// Deliver the run payload once, if an endpoint and a transport are both
/// configured. Best-effort by contract.
pub fn deliver_run(
    registry: &CapabilityRegistry,
    endpoint: Option<&str>,
    metadata: &RunMetadata,
    audit: &[AuditEvent],
) {
    let Some(endpoint) = endpoint else { return };
    let Some(transport) = registry.telemetry() else {
        tracing::warn!(
            endpoint,
            "telemetry endpoint configured but no transport registered; skipping"
        );
        return;
    };
    let Some(payload) = serialize_payload(metadata, audit) else {
        return;
    };
    match transport.deliver(endpoint, &payload) {
        Ok(()) => tracing::debug!(endpoint, bytes = payload.len(), "telemetry delivered"),
        Err(message) => {
            tracing::warn!(endpoint, %message, "telemetry delivery failed (run unaffected)");
        }
    }
}
