use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Sessions idle longer than this are removed by the reaper.
    #[serde(default = "d_3600")]
    pub idle_timeout_secs: u64,
    /// Interval between reaper sweeps.
    #[serde(default = "d_300")]
    pub reap_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 3600,
            reap_interval_secs: 300,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_3600() -> u64 {
    3600
}
fn d_300() -> u64 {
    300
}
