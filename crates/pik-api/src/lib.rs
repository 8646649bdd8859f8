//! HTTP surface for the Persistent Identity Kernel: identity, consent,
//! ingest, WebAuthn auth, config/sources, and the ledger SSE stream.

pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;
