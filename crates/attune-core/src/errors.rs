use std::time::Duration;

/// Typed error hierarchy for channel operations.
/// Classifies errors as transient (reconnect handles them), terminal
/// (reconnection exhausted), or per-request failures.
#[derive(Clone, Debug, thiserror::Error)]
pub enum TransportError {
    // Transient — the reconnect loop is the retry mechanism
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    // Per-request — not retried by the channel
    #[error("not connected")]
    NotConnected,
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("http status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("http request failed: {0}")]
    HttpRequest(String),

    // Terminal
    #[error("reconnect exhausted after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    // Operational
    #[error("timeout after {0:?}")]
    Timeout(Duration),
}

impl TransportError {
    /// Transient errors are handled by the reconnect loop, nothing else.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectFailed(_) | Self::ChannelClosed(_))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ReconnectExhausted { .. })
    }

    /// Short classification string for logging/metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectFailed(_) => "connect_failed",
            Self::ChannelClosed(_) => "channel_closed",
            Self::NotConnected => "not_connected",
            Self::SendFailed(_) => "send_failed",
            Self::MalformedFrame(_) => "malformed_frame",
            Self::Backend(_) => "backend",
            Self::HttpStatus { .. } => "http_status",
            Self::HttpRequest(_) => "http_request",
            Self::ReconnectExhausted { .. } => "reconnect_exhausted",
            Self::Timeout(_) => "timeout",
        }
    }
}

/// Adapter-side device errors. Permission denial is terminal for that
/// adapter's session only; the orchestrator keeps running other modalities.
#[derive(Clone, Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("device access denied: {0}")]
    PermissionDenied(String),
    #[error("device unavailable: {0}")]
    Unavailable(String),
    #[error("unsupported device: {0}")]
    Unsupported(String),
}

impl DeviceError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(TransportError::ConnectFailed("refused".into()).is_transient());
        assert!(TransportError::ChannelClosed("eof".into()).is_transient());
        assert!(!TransportError::NotConnected.is_transient());
        assert!(!TransportError::Backend("bad".into()).is_transient());
    }

    #[test]
    fn terminal_classification() {
        assert!(TransportError::ReconnectExhausted { attempts: 5 }.is_terminal());
        assert!(!TransportError::ConnectFailed("refused".into()).is_terminal());
    }

    #[test]
    fn kind_strings() {
        assert_eq!(TransportError::NotConnected.kind(), "not_connected");
        assert_eq!(
            TransportError::ReconnectExhausted { attempts: 5 }.kind(),
            "reconnect_exhausted"
        );
        assert_eq!(
            TransportError::HttpStatus { status: 500, body: "err".into() }.kind(),
            "http_status"
        );
    }

    #[test]
    fn device_error_permission() {
        assert!(DeviceError::PermissionDenied("camera".into()).is_permission_denied());
        assert!(!DeviceError::Unavailable("busy".into()).is_permission_denied());
    }
}
