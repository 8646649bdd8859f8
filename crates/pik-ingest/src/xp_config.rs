//! Snapshot of the tunable XP/level config, read once per ingest call
//! (spec §4.4, §4.10).

use pik_core::config_keys::{self, ParsedValue};
use pik_db::ConfigRepo;
use std::collections::HashMap;

use crate::error::IngestResult;

pub struct XpConfig {
    values: HashMap<String, ParsedValue>,
}

impl XpConfig {
    pub async fn load(config: &ConfigRepo) -> IngestResult<Self> {
        let rows = config.get_all().await?;
        let values = rows
            .into_iter()
            .map(|row| (row.config_key, ParsedValue::from_stored(&row.config_value)))
            .collect();
        Ok(Self { values })
    }

    fn number(&self, key: &str) -> f64 {
        self.values
            .get(key)
            .and_then(ParsedValue::as_f64)
            .or_else(|| config_keys::lookup(key).and_then(|spec| spec.default.parse().ok()))
            .unwrap_or(0.0)
    }

    pub fn xp_per_session_normal(&self) -> f64 {
        self.number("xp_per_session_normal")
    }

    pub fn xp_per_session_hard(&self) -> f64 {
        self.number("xp_per_session_hard")
    }

    pub fn xp_boss_tier_pct(&self) -> f64 {
        self.number("xp_boss_tier_pct")
    }

    pub fn xp_node_completion(&self) -> f64 {
        self.number("xp_node_completion")
    }

    pub fn event_xp_multiplier(&self) -> f64 {
        self.number("event_xp_multiplier")
    }

    pub fn xp_base_threshold(&self) -> f64 {
        self.number("xp_base_threshold")
    }

    pub fn xp_level_multiplier(&self) -> f64 {
        self.number("xp_level_multiplier")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_known_defaults_when_missing() {
        let cfg = XpConfig { values: HashMap::new() };
        assert_eq!(cfg.xp_base_threshold(), 100.0);
        assert_eq!(cfg.xp_level_multiplier(), 1.5);
    }

    #[test]
    fn prefers_stored_value_over_default() {
        let mut values = HashMap::new();
        values.insert("xp_base_threshold".to_string(), ParsedValue::Number(250.0));
        let cfg = XpConfig { values };
        assert_eq!(cfg.xp_base_threshold(), 250.0);
    }
}
