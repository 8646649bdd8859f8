//! Periodic expiry sweep for one-shot challenges and session tokens
//! (spec §4.13). Runs at startup and then every 15 minutes; failures are
//! logged and retried on the next tick rather than propagated.

use pik_db::{AuthKeyRepo, SessionRepo};
use std::time::Duration;

const SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[derive(Clone)]
pub struct Reaper {
    auth_keys: AuthKeyRepo,
    sessions: SessionRepo,
}

impl Reaper {
    pub fn new(auth_keys: AuthKeyRepo, sessions: SessionRepo) -> Self {
        Self { auth_keys, sessions }
    }

    pub async fn sweep_once(&self) {
        let now = chrono::Utc::now();

        match self.auth_keys.delete_expired_challenges(now).await {
            Ok(count) if count > 0 => tracing::info!(count, "reaper: expired webauthn challenges deleted"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "reaper: failed to delete expired challenges"),
        }

        match self.sessions.delete_expired(now).await {
            Ok(count) if count > 0 => tracing::info!(count, "reaper: expired session tokens deleted"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "reaper: failed to delete expired sessions"),
        }
    }

    /// Runs forever, sweeping immediately and then every 15 minutes.
    /// Intended to be spawned as its own task at startup.
    pub async fn run(self) {
        self.sweep_once().await;
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            self.sweep_once().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_interval_is_fifteen_minutes() {
        assert_eq!(SWEEP_INTERVAL, Duration::from_secs(900));
    }
}
