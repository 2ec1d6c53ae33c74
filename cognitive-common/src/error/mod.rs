//! Error types shared by the metric, alert and recording components.
//!
//! Component errors in `cognitive-core` wrap these with `#[from]` and
//! implement [`ErrorClassification`] so a host can tell a rejected input
//! from a busy recorder without matching every variant.

mod common;
mod traits;

pub use common::{ConfigurationError, EntityError, SerializationError, ValidationError};
pub use traits::{ErrorCategory, ErrorClassification};
