//! Selkie Core
//!
//! Shared foundation for the Selkie service-registration syncer:
//! error types, configuration, explicit limits, the time abstraction,
//! and telemetry bootstrap.
//!
//! # TigerStyle
//!
//! This crate follows [TigerStyle](https://github.com/tigerbeetle/tigerbeetle/blob/main/docs/TIGER_STYLE.md)
//! engineering principles:
//! - Safety > Performance > Developer Experience
//! - Explicit limits with big-endian naming (e.g., `SYNC_INTERVAL_MS_MAX`)
//! - Errors are returned, never panics

pub mod config;
pub mod constants;
pub mod error;
pub mod io;
pub mod telemetry;

pub use config::{AgentConfig, SyncerConfig};
pub use constants::*;
pub use error::{Error, Result};
pub use io::{TimeProvider, WallClockTime};
pub use telemetry::{init_telemetry, TelemetryConfig};
