//! Single-shot HTTP fallback for when no channel is available.

use serde_json::Value;
use tracing::warn;

use attune_core::errors::TransportError;
use attune_core::model::AnalysisRequest;

/// One-request-at-a-time fallback client. Non-2xx is a hard failure for
/// that request; the caller decides whether to try again.
pub struct HttpFallback {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFallback {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// `POST /api/video-analysis` with the frame payload and metadata.
    pub async fn analyze_frame(&self, request: &AnalysisRequest) -> Result<Value, TransportError> {
        let url = format!("{}/api/video-analysis", self.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::HttpRequest(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "single-shot video analysis failed");
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }
        resp.json()
            .await
            .map_err(|e| TransportError::MalformedFrame(e.to_string()))
    }
}
