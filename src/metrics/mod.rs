//! Metrics and observability infrastructure.
//!
//! - `events`: internal event types and the `InternalEvent` trait
//! - `server`: Prometheus HTTP server and initialization

pub mod events;
pub mod server;

pub use server::init;

/// Emit an internal event as a metric.
///
/// Calls `InternalEvent::emit()` on the given event, recording the
/// corresponding Prometheus metric.
///
/// # Example
///
/// ```ignore
/// use linescrub::metrics::events::LinesProcessed;
///
/// emit!(LinesProcessed { count: 100 });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}
