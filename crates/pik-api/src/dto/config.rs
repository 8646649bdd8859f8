//! Runtime config shapes (spec §6 `/api/config`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct ConfigEntryView {
    pub config_key: String,
    pub value: Value,
}

#[derive(Debug, Deserialize)]
pub struct SetConfigRequest {
    pub config_key: String,
    pub config_value: String,
}
