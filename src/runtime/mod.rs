//! Interceptor composition, subscriber fan-out and time sources.

/// Wall-clock and monotonic time sources.
pub mod clock;
/// Lifecycle events emitted to subscribers.
pub mod events;
/// Ordered callback fan-out.
pub mod hub;
/// The interception engine and its builder.
pub mod interceptor;

pub use clock::{Clock, ManualClock, SystemClock};
pub use events::OperationEvent;
pub use hub::{SubscriberHub, Subscription};
pub use interceptor::{Interceptor, InterceptorBuilder};
