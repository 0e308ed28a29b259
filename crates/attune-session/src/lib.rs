//! Session orchestration: the single source of truth for capture/send
//! pipeline state, queuing policy, and result fan-out.

pub mod biometric;
pub mod capture;
mod orchestrator;
mod queue;
mod subscribers;
mod trend;
mod window;

pub use orchestrator::{ModalitySummary, SessionOrchestrator};
pub use queue::{PendingQueue, DEFAULT_QUEUE_CAPACITY};
pub use subscribers::SubscriptionId;
pub use trend::{compute_trend, Trend, TrendDirection, TREND_SAMPLE_LIMIT};
pub use window::{RollingWindow, HISTORY_WINDOW_MS, MICROEXPRESSION_WINDOW_MS};
