//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML/JSON)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, startup only)
//!     → GatewayConfig (immutable)
//!
//! On reload (control endpoint, SIGHUP or watcher.rs):
//!     → loader.rs re-reads the file
//!     → each existing listener validates and swaps its own policy
//! ```
//!
//! # Design Decisions
//! - Only router policies change after startup; everything else needs a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, read_config, ConfigError};
pub use schema::{
    parse_listen_addr, GatewayConfig, LogFormat, ObservabilityConfig, RouterConfig, SyncConfig,
    TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
