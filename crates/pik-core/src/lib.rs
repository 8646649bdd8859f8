//! Shared foundation types for the Persistent Identity Kernel workspace:
//! the error taxonomy every crate maps onto, and the config key registry.

pub mod config_keys;
pub mod error;

pub use config_keys::{ConfigKind, ConfigSpec, ParsedValue, KNOWN_KEYS};
pub use error::{Kind, PikError, PikResult};
