//! Email alerting: per-channel alert state, the notifier that queues
//! messages, and the transports that deliver them.

pub mod alert_state;
pub mod notifier;
pub mod transport;

pub use alert_state::{AlertChannel, AlertEvent, AlertHistory, AlertPolicy, AlertTracker};
pub use notifier::EmailNotifier;
pub use transport::{OutboxTransport, SmtpTransport, TransportError};
