//! Name resolution subsystem.
//!
//! # Data Flow
//! ```text
//! Remote source (source.rs)
//!     → sync.rs (rate-limited, debounced fetch loop)
//!     → table.rs (validate entries, build NameTable)
//!     → atomic swap of the shared table
//!
//! Request path:
//!     → SyncManager::request_refresh (non-blocking nudge)
//!     → SyncManager::lookup (snapshot read)
//! ```
//!
//! # Design Decisions
//! - One table shared by every listener, owned by the sync loop
//! - Tables are replaced wholesale, never mutated in place
//! - Fetch and parse failures keep the last good table

pub mod source;
pub mod sync;
pub mod table;

pub use source::{HttpTableSource, SyncError, TableSource};
pub use sync::{SyncManager, SyncReport, SyncSettings, SyncWorker};
pub use table::{InvalidEntry, NameTable, SharedTable};
