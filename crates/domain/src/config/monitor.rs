use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Monitoring collaborator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// When false, status/capability queries answer with generic payloads.
    #[serde(default)]
    pub enabled: bool,
    /// Base URL of the monitoring service.
    #[serde(default = "d_monitor_url")]
    pub base_url: String,
    #[serde(default = "d_30")]
    pub timeout_secs: u64,
    /// Interval between proactive log sweeps. Alerts found are broadcast
    /// to every connected session.
    #[serde(default = "d_300")]
    pub alert_interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: d_monitor_url(),
            timeout_secs: 30,
            alert_interval_secs: 300,
        }
    }
}

fn d_monitor_url() -> String {
    "http://localhost:9020".into()
}
fn d_30() -> u64 {
    30
}
fn d_300() -> u64 {
    300
}
