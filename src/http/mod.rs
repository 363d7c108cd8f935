//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, timeout)
//!     → director.rs (resolve virtual host, enforce allow-list, rewrite)
//!     → request.rs (hop-by-hop headers, X-Forwarded-For)
//!     → backend client (http or https)
//!     → response.rs (denials mapped to status codes)
//!     → Send to client
//! ```

pub mod director;
pub mod request;
pub mod response;
pub mod server;

pub use director::{Denial, Director, Forward, Resolution};
pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{backend_client, BackendClient, HttpServer};
