//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! RouterConfig template
//!     → cidr.rs (parse every allowed block)
//!     → policy.rs (build immutable Policy, swap into PolicyStore)
//!
//! Request path:
//!     → PolicyStore::current (snapshot)
//!     → Policy::permits (allow-list membership)
//! ```
//!
//! # Design Decisions
//! - Fail closed: an empty allow-list denies everything
//! - Validate before commit: a bad block never reaches readers

pub mod cidr;
pub mod policy;

pub use cidr::{CidrBlock, CidrParseError};
pub use policy::{Policy, PolicyError, PolicyStore};
