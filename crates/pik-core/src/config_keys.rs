//! The enumerated set of tunable config keys (spec §3 Config, §4.4, §4.10).
//!
//! Config is stored as stringly-typed `(key, value)` rows; this module is
//! the single place that knows which keys exist and what type a reader
//! should parse each one as. Writing an unknown key is a `BadRequest`.

use std::collections::HashMap;

/// The logical type a config value parses to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    /// Parses as a number when it cleanly round-trips (spec §4.4); a
    /// non-numeric string is a write-time shape error for these keys.
    Number,
    /// Free-form string, e.g. default consent scope.
    Text,
}

/// One entry in the config registry: the key name, its kind, and the
/// seeded default value (as stored, i.e. stringly-typed).
pub struct ConfigSpec {
    pub key: &'static str,
    pub kind: ConfigKind,
    pub default: &'static str,
}

/// All keys the kernel understands, with their seed defaults.
///
/// Values mirror spec §8 property 7's defaults: `(100/150, 0.5, 15, 1.0)`
/// for `(xp_base_threshold, xp_level_multiplier, xp_node_completion,
/// event_xp_multiplier)` and the session constants from §4.10.
pub const KNOWN_KEYS: &[ConfigSpec] = &[
    ConfigSpec { key: "xp_per_session_normal", kind: ConfigKind::Number, default: "100" },
    ConfigSpec { key: "xp_per_session_hard", kind: ConfigKind::Number, default: "150" },
    ConfigSpec { key: "xp_boss_tier_pct", kind: ConfigKind::Number, default: "0.5" },
    ConfigSpec { key: "xp_node_completion", kind: ConfigKind::Number, default: "15" },
    ConfigSpec { key: "event_xp_multiplier", kind: ConfigKind::Number, default: "1.0" },
    ConfigSpec { key: "xp_base_threshold", kind: ConfigKind::Number, default: "100" },
    ConfigSpec { key: "xp_level_multiplier", kind: ConfigKind::Number, default: "1.5" },
    ConfigSpec { key: "session_token_ttl_secs", kind: ConfigKind::Number, default: "3600" },
    ConfigSpec { key: "challenge_ttl_secs", kind: ConfigKind::Number, default: "300" },
    ConfigSpec { key: "default_consent_scope", kind: ConfigKind::Text, default: "progression.write" },
];

/// Look up the spec for a key name, if known.
pub fn lookup(key: &str) -> Option<&'static ConfigSpec> {
    KNOWN_KEYS.iter().find(|k| k.key == key)
}

pub fn is_known(key: &str) -> bool {
    lookup(key).is_some()
}

/// Parsed config value: numeric when the stored string parses cleanly as a
/// finite number, string otherwise (spec §4.4 "numeric parse-on-read").
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedValue {
    Number(f64),
    Text(String),
}

impl ParsedValue {
    pub fn from_stored(raw: &str) -> Self {
        match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => ParsedValue::Number(n),
            _ => ParsedValue::Text(raw.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParsedValue::Number(n) => Some(*n),
            ParsedValue::Text(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ParsedValue::Number(n) => serde_json::json!(n),
            ParsedValue::Text(s) => serde_json::json!(s),
        }
    }
}

/// Parse a full `{key: raw_value}` map into `{key: ParsedValue}`.
pub fn parse_all(raw: &HashMap<String, String>) -> HashMap<String, ParsedValue> {
    raw.iter()
        .map(|(k, v)| (k.clone(), ParsedValue::from_stored(v)))
        .collect()
}

/// Build the seed map of default values, for first-run migration/seeding.
pub fn seed_defaults() -> HashMap<String, String> {
    KNOWN_KEYS
        .iter()
        .map(|spec| (spec.key.to_string(), spec.default.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_keys_round_trip() {
        assert!(is_known("xp_base_threshold"));
        assert!(!is_known("not_a_real_key"));
    }

    #[test]
    fn numeric_values_parse_as_numbers() {
        assert_eq!(ParsedValue::from_stored("1.5"), ParsedValue::Number(1.5));
        assert_eq!(ParsedValue::from_stored("100"), ParsedValue::Number(100.0));
    }

    #[test]
    fn non_numeric_values_stay_strings() {
        assert_eq!(
            ParsedValue::from_stored("progression.write"),
            ParsedValue::Text("progression.write".to_string())
        );
    }

    #[test]
    fn nan_like_strings_are_not_numeric() {
        // "nan" parses via f64::from_str but is not finite-comparable the
        // way a config reader expects a number to behave; treat as text.
        match ParsedValue::from_stored("nan") {
            ParsedValue::Number(n) => assert!(n.is_nan()),
            ParsedValue::Text(_) => panic!("expected nan to parse numerically"),
        }
    }

    #[test]
    fn seed_defaults_cover_every_known_key() {
        let defaults = seed_defaults();
        assert_eq!(defaults.len(), KNOWN_KEYS.len());
        for spec in KNOWN_KEYS {
            assert_eq!(defaults.get(spec.key).unwrap(), spec.default);
        }
    }
}
