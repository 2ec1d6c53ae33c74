//! `tracing` subscriber setup shared by every observability binary.
//!
//! Environment:
//! - `RUST_LOG`: filter directives, e.g. `info,cognitive_core::recording=debug`
//! - `LOG_LEVEL`: fallback filter when `RUST_LOG` is unset
//! - `LOG_FORMAT`: `pretty` (default), `compact` or `json`
//! - `LOG_TIMESTAMPS`: `local` (default), `utc` or `none`
//! - `LOG_LOCATION`: `true` to include `file:line`

mod config;
mod json_layer;

pub use config::{init_logging, LogConfig, LogFormat, Timestamps};
pub use json_layer::{JsonLayer, JsonLogEvent};
