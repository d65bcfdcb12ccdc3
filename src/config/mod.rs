//! Configuration for the master server.
//!
//! - [`types`]: the root [`Config`] struct.
//! - [`logging`]: log level/format types.
//! - [`loader`]: layered load (defaults → file → env).
//! - [`validation`]: startup sanity checks.
//! - [`defaults`]: default-value functions referenced by `#[serde(default = "...")]`.

pub mod defaults;
pub mod loader;
pub mod logging;
pub mod types;
pub mod validation;

pub use loader::load;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use types::Config;
pub use validation::validate;
