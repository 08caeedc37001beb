//! Event dispatch

mod registry;

pub use registry::{EventRegistry, HandlerFuture, HandlerToken, Matcher, DEFAULT_WORKERS};
