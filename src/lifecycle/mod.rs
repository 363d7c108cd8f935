//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Sync loop → Policy stores → Listeners → Control interface
//!
//! Reload (reload.rs, registry.rs):
//!     /reload, SIGHUP, file watcher → re-read file → update existing policies
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Reload router policies
//! ```

pub mod registry;
pub mod reload;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use registry::{ListenerRegistry, RegistryError, ReloadFailure, ReloadReport};
pub use reload::reload_from_disk;
pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
pub use startup::{Gateway, StartupError};
