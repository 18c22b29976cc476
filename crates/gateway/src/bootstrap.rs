//! AppState construction and background-task spawning extracted from
//! `main.rs`.

use std::sync::Arc;

use vox_domain::config::{Config, ConfigSeverity};
use vox_providers::{registry, ProviderRouter};
use vox_sessions::SessionStore;

use crate::state::AppState;

/// Validate config, initialize every subsystem and return a fully-wired
/// [`AppState`].
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Session store ────────────────────────────────────────────────
    let sessions = Arc::new(SessionStore::new(config.sessions.idle_timeout_secs));
    tracing::info!(
        idle_timeout_secs = config.sessions.idle_timeout_secs,
        "session store ready"
    );

    // ── LLM providers + router ───────────────────────────────────────
    let providers = registry::build_providers(&config.providers).await;
    if providers.is_empty() {
        tracing::info!(
            "no LLM providers registered — configure credentials to enable chat"
        );
    } else {
        tracing::info!(providers = providers.len(), "LLM provider registry ready");
    }
    let router = Arc::new(ProviderRouter::new(
        providers,
        config.providers.fallback_chain.clone(),
    ));

    // ── Speech collaborator ──────────────────────────────────────────
    let speech = vox_speech::create_processor(&config.speech)
        .map_err(|e| anyhow::anyhow!("initializing speech client: {e}"))?;

    // ── Monitoring collaborator ──────────────────────────────────────
    let monitor = vox_monitor::create_monitor(&config.monitor)
        .map_err(|e| anyhow::anyhow!("initializing monitor client: {e}"))?;

    Ok(AppState {
        config,
        sessions,
        router,
        speech,
        monitor,
    })
}

/// Spawn the long-running background tokio tasks (session reaper,
/// provider health sweep).
///
/// Call this **after** [`build_app_state`] when running the server.
pub fn spawn_background_tasks(state: &AppState) {
    // ── Session reaper ───────────────────────────────────────────────
    {
        let sessions = state.sessions.clone();
        let interval_secs = state.config.sessions.reap_interval_secs;
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            // The first tick fires immediately; skip it so a fresh boot
            // does not race session creation.
            interval.tick().await;
            loop {
                interval.tick().await;
                let reaped = sessions.reap();
                if reaped > 0 {
                    tracing::info!(reaped, remaining = sessions.count(), "session reaper ran");
                }
            }
        });
    }

    // ── Provider health sweep ────────────────────────────────────────
    {
        let router = state.router.clone();
        let interval_secs = state.config.providers.health_sweep_secs;
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            interval.tick().await;
            loop {
                interval.tick().await;
                router.health_check_all().await;
            }
        });
    }

    // ── Proactive alert sweep ────────────────────────────────────────
    // Polls the monitoring collaborator's log analysis and pushes an
    // alert envelope to every connected session when something is wrong.
    if state.config.monitor.enabled {
        let monitor = state.monitor.clone();
        let sessions = state.sessions.clone();
        let interval_secs = state.config.monitor.alert_interval_secs;
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            interval.tick().await;
            loop {
                interval.tick().await;
                let analysis = match monitor.error_analysis().await {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!(error = %e, "proactive alert sweep failed");
                        continue;
                    }
                };
                let severity = analysis["severity"].as_str().unwrap_or("info");
                if severity != "info" {
                    tracing::warn!(severity = %severity, "broadcasting proactive alert");
                    sessions
                        .broadcast(vox_protocol::ServerEnvelope::ProactiveAlert {
                            payload: analysis,
                            timestamp: chrono::Utc::now(),
                        })
                        .await;
                }
            }
        });
    }

    tracing::info!("background tasks spawned");
}
