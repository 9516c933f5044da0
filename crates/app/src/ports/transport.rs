//! Push transport port — a connector that opens a stream of named frames.

use std::future::Future;
use std::pin::Pin;

use homesync_domain::error::TransportError;
use homesync_domain::frame::RawFrame;
use tokio_stream::Stream;

/// Frames of one live connection. The stream ending means the connection closed.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<RawFrame, TransportError>> + Send>>;

/// Opens push connections (SSE, WebSocket, …).
pub trait PushConnector: Send + Sync + 'static {
    /// Open a connection to `url`; resolves once the server accepted it.
    fn connect(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<FrameStream, TransportError>> + Send;
}

impl<T: PushConnector> PushConnector for std::sync::Arc<T> {
    fn connect(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<FrameStream, TransportError>> + Send {
        (**self).connect(url)
    }
}

/// Receives every frame of the live connection, in order.
pub trait FrameSink: Send + Sync + 'static {
    fn handle(&self, frame: RawFrame);
}

impl<T: FrameSink> FrameSink for std::sync::Arc<T> {
    fn handle(&self, frame: RawFrame) {
        (**self).handle(frame);
    }
}
