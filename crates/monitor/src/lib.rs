//! `vox-monitor` — monitoring collaborator client for VoxRelay.
//!
//! The monitoring service runs log analysis and capability Q&A over a
//! local model; this crate only carries the boundary: a [`Monitor`] trait
//! with status, capability, and error-analysis queries, an HTTP
//! implementation, and the generic fallback payloads the dispatcher
//! substitutes when a query fails.

pub mod rest;

pub use rest::HttpMonitorClient;

use std::sync::Arc;

use vox_domain::config::MonitorConfig;
use vox_domain::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Abstraction over the monitoring service. Results are structured JSON
/// relayed to clients verbatim.
#[async_trait::async_trait]
pub trait Monitor: Send + Sync {
    /// System status over a recent timeframe.
    async fn status_query(
        &self,
        query_type: &str,
        timeframe_minutes: u32,
    ) -> Result<serde_json::Value>;

    /// Capability question ("can you do X?") with optional context.
    async fn capability_query(
        &self,
        question: &str,
        context: &serde_json::Value,
    ) -> Result<serde_json::Value>;

    /// Analysis of recent log errors.
    async fn error_analysis(&self) -> Result<serde_json::Value>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Disabled stub
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Used when no monitoring service is configured. Every query fails,
/// which the dispatcher turns into the generic payloads below.
pub struct DisabledMonitor;

#[async_trait::async_trait]
impl Monitor for DisabledMonitor {
    async fn status_query(
        &self,
        _query_type: &str,
        _timeframe_minutes: u32,
    ) -> Result<serde_json::Value> {
        Err(Error::Monitor("monitoring service disabled".into()))
    }

    async fn capability_query(
        &self,
        _question: &str,
        _context: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        Err(Error::Monitor("monitoring service disabled".into()))
    }

    async fn error_analysis(&self) -> Result<serde_json::Value> {
        Err(Error::Monitor("monitoring service disabled".into()))
    }
}

/// Create the monitor client matching the config.
pub fn create_monitor(cfg: &MonitorConfig) -> Result<Arc<dyn Monitor>> {
    if !cfg.enabled {
        tracing::info!("monitoring service disabled; queries answer with generic payloads");
        return Ok(Arc::new(DisabledMonitor));
    }
    let client = HttpMonitorClient::new(cfg)?;
    tracing::info!(url = %cfg.base_url, "monitor client ready");
    Ok(Arc::new(client))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Generic fallback payloads
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Same shape as a real status response, reporting the failure.
pub fn generic_status_payload(detail: &str) -> serde_json::Value {
    serde_json::json!({
        "status": "error",
        "metrics": {},
        "analysis": format!("Error gathering system status: {detail}"),
        "recommendations": ["Check system logs", "Restart monitoring service"],
        "alerts": [],
    })
}

/// Same shape as a real capability answer, reporting the failure.
pub fn generic_capability_payload(detail: &str) -> serde_json::Value {
    serde_json::json!({
        "answer": format!("Error processing capability query: {detail}"),
        "capability_assessment": {
            "question_understood": false,
            "explanation": "System error occurred",
            "alternatives": ["Try again later", "Check system status"],
        },
        "confidence": 0,
    })
}

/// Same shape as a real error analysis, reporting a quiet system.
pub fn generic_error_analysis_payload() -> serde_json::Value {
    serde_json::json!({
        "analysis": "No recent errors detected in system logs",
        "root_cause": "System operating normally",
        "severity": "info",
        "recommendations": ["Continue monitoring"],
        "predicted_resolution_time": "immediate",
    })
}
