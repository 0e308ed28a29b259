//! Transport layer: a single logical bidirectional connection to the
//! analysis backend, with reconnection and framing abstracted away from
//! the orchestrator, plus the single-shot HTTP fallback.

mod channel;
mod connector;
mod http;
pub mod mock;
mod ws;

pub use channel::{AnalysisChannel, ChannelConfig, ChannelEvent, ConnectionState};
pub use connector::{Connector, Link};
pub use http::HttpFallback;
pub use ws::WsConnector;
