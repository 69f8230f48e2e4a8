// Macros (must be first for visibility)
#[macro_use]
pub mod macros;

pub mod common;
pub mod config;
pub mod counters;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod report;
pub mod system;

pub use config::{PowerRequest, ToolConfig};
pub use error::{RaplError, Result};
pub use orchestrator::Session;
pub use system::RaplSystem;
