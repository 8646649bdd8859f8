//! Environment-sourced configuration for the auth layer (spec §4.6, §6).

/// WebAuthn relying-party parameters (spec §4.6 — "parameters come from
/// environment").
#[derive(Debug, Clone)]
pub struct WebAuthnSettings {
    pub rp_name: String,
    pub rp_id: String,
    pub origin: String,
}

impl WebAuthnSettings {
    pub fn from_env() -> Self {
        Self {
            rp_name: std::env::var("WEBAUTHN_RP_NAME").unwrap_or_else(|_| "PIK".to_string()),
            rp_id: std::env::var("WEBAUTHN_RP_ID").unwrap_or_else(|_| "localhost".to_string()),
            origin: std::env::var("WEBAUTHN_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
        }
    }
}

/// Sliding-window rate limit policy for one route group (spec §4.12).
#[derive(Debug, Clone, Copy)]
pub struct RoutePolicy {
    pub requests_per_window: u32,
    pub window_secs: u64,
}

impl RoutePolicy {
    pub const fn new(requests_per_window: u32, window_secs: u64) -> Self {
        Self { requests_per_window, window_secs }
    }
}

/// The default policy table from spec §4.12. `health` is intentionally
/// absent here — "unlimited" means callers skip the limiter entirely
/// rather than being handed a policy with no ceiling.
pub struct RoutePolicies;

impl RoutePolicies {
    pub const DEFAULT: RoutePolicy = RoutePolicy::new(60, 60);
    pub const INGEST: RoutePolicy = RoutePolicy::new(120, 60);
    pub const AUTH: RoutePolicy = RoutePolicy::new(10, 60);
    pub const DEMO: RoutePolicy = RoutePolicy::new(5, 60);
}
