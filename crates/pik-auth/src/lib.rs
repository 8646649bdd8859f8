//! Authentication and authorization for the kernel: passkey ceremonies,
//! source API keys, session tokens, consent links, rate limiting, and the
//! expiry reaper (spec §4.5-§4.13).
//!
//! Deliberately free of any HTTP-framework dependency — `pik-api` owns
//! request extraction (headers, `AppState`) and calls into these types.

pub mod config;
pub mod consent;
pub mod error;
pub mod keys;
pub mod rate_limit;
pub mod reaper;
pub mod session;
pub mod source;
pub mod webauthn;

pub use config::{RoutePolicies, RoutePolicy, WebAuthnSettings};
pub use consent::Consent;
pub use error::{AuthError, AuthResult};
pub use keys::KeyManager;
pub use rate_limit::RateLimiter;
pub use reaper::Reaper;
pub use session::{IssuedSession, SessionIssuer};
pub use source::{ApiKeyAuth, ResolvedSource, SourceRegistry};
pub use webauthn::{AuthenticationOutcome, RegistrationOutcome, WebAuthnEngine};

use pik_db::Database;
use pik_ledger::Ledger;
use std::sync::Arc;

/// Bundles every auth-layer component that shares the same pool so
/// `pik-api` can construct them all from one `Database`.
pub struct AuthSuite {
    pub webauthn: WebAuthnEngine,
    pub keys: KeyManager,
    pub sessions: SessionIssuer,
    pub sources: SourceRegistry,
    pub api_keys: ApiKeyAuth,
    pub consent: Consent,
    pub rate_limiter: RateLimiter,
    pub reaper: Reaper,
}

impl AuthSuite {
    pub fn new(
        db: &Arc<Database>,
        webauthn_settings: WebAuthnSettings,
        session_ttl_secs: i64,
        ledger: Ledger,
    ) -> AuthResult<Self> {
        let sessions = SessionIssuer::new(db.session_repo(), session_ttl_secs);
        let webauthn = WebAuthnEngine::new(
            webauthn_settings,
            db.identity_repo(),
            db.authkey_repo(),
            db.source_repo(),
            sessions.clone(),
            ledger.clone(),
        )?;

        Ok(Self {
            keys: KeyManager::new(db.authkey_repo(), webauthn.clone(), ledger),
            sources: SourceRegistry::new(db.source_repo()),
            api_keys: ApiKeyAuth::new(db.source_repo()),
            consent: Consent::new(db.source_repo(), db.identity_repo()),
            rate_limiter: RateLimiter::new(),
            reaper: Reaper::new(db.authkey_repo(), db.session_repo()),
            webauthn,
            sessions,
        })
    }
}
