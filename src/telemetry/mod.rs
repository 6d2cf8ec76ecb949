//! Telemetry
//!
//! Flow-level logging. Strategies, the consumer and provider adapters also
//! emit `tracing` events directly.

pub mod logging;

pub use logging::{
    create_in_memory_logger, create_tracing_logger, AuthLogContext, InMemoryLogger, LogEntry,
    LogLevel, Logger, TracingLogger,
};
