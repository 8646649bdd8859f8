//! Request/response shapes for every route group (spec §6).

pub mod auth;
pub mod common;
pub mod config;
pub mod consent;
pub mod identity;
pub mod ingest;
pub mod source;

pub use auth::*;
pub use common::*;
pub use config::*;
pub use consent::*;
pub use identity::*;
pub use ingest::*;
pub use source::*;
