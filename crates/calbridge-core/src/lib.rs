//! Core types: event times, query windows, display events, tracing

pub mod event;
pub mod time;
pub mod tracing;

pub use event::DisplayEvent;
pub use time::{EventTime, TimeWindow};
pub use tracing::{init_tracing, TracingConfig, TracingError, TracingOutputFormat};
