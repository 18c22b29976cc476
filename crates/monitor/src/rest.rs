//! HTTP implementation of [`Monitor`].

use serde_json::Value;

use vox_domain::config::MonitorConfig;
use vox_domain::error::{Error, Result};

use crate::Monitor;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A REST client for the monitoring service.
#[derive(Debug, Clone)]
pub struct HttpMonitorClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpMonitorClient {
    pub fn new(cfg: &MonitorConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
        })
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Monitor(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Monitor(format!("HTTP {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Monitor(format!("unparseable response: {e}")))
    }
}

#[async_trait::async_trait]
impl Monitor for HttpMonitorClient {
    async fn status_query(
        &self,
        query_type: &str,
        timeframe_minutes: u32,
    ) -> Result<Value> {
        self.post(
            "/v1/status",
            serde_json::json!({
                "query_type": query_type,
                "timeframe_minutes": timeframe_minutes,
            }),
        )
        .await
    }

    async fn capability_query(&self, question: &str, context: &Value) -> Result<Value> {
        self.post(
            "/v1/capability",
            serde_json::json!({
                "question": question,
                "context": context,
            }),
        )
        .await
    }

    async fn error_analysis(&self) -> Result<Value> {
        self.post("/v1/error-analysis", serde_json::json!({})).await
    }
}
