use async_trait::async_trait;

use attune_core::errors::TransportError;
use attune_core::events::WireFrame;

/// One established connection. Owned by the channel's driver task for the
/// lifetime of the connection; a new `Link` is produced per reconnect.
#[async_trait]
pub trait Link: Send {
    async fn send(&mut self, frame: WireFrame) -> Result<(), TransportError>;

    /// Next inbound frame. `None` means the underlying channel closed.
    async fn recv(&mut self) -> Option<Result<WireFrame, TransportError>>;

    async fn close(&mut self);
}

/// Connection factory seam. Production uses [`crate::WsConnector`]; tests
/// script [`crate::mock::MockConnector`].
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Box<dyn Link>, TransportError>;
}

#[async_trait]
impl<T: Connector + ?Sized> Connector for std::sync::Arc<T> {
    async fn connect(&self) -> Result<Box<dyn Link>, TransportError> {
        (**self).connect().await
    }
}
