//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! TOML file → loader.rs (read, parse)
//!           → validation.rs (semantic checks, all errors collected)
//!           → schema.rs types consumed by the rest of the system
//! ```
//!
//! # Design Decisions
//! - Every section defaults: an empty file is a valid config
//! - Validation is a pure function over the parsed config
//! - Values only; no environment merging or hot reload

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ListenerConfig, ObservabilityConfig, RateLimitConfig, ServerConfig, ShutdownConfig,
};
