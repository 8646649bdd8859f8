//! Passkey lifecycle: list, rotate (delegates to registration phase 1),
//! revoke with last-active-key protection (spec §4.7).

use pik_db::{AuthKeyRepo, DbAuthKey, DbIdentityEvent};
use pik_ledger::Ledger;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::webauthn::{RegistrationChallenge, WebAuthnEngine};

#[derive(Clone)]
pub struct KeyManager {
    keys: AuthKeyRepo,
    webauthn: WebAuthnEngine,
    ledger: Ledger,
}

impl KeyManager {
    pub fn new(keys: AuthKeyRepo, webauthn: WebAuthnEngine, ledger: Ledger) -> Self {
        Self { keys, webauthn, ledger }
    }

    pub async fn list(&self, root_id: Uuid) -> AuthResult<Vec<DbAuthKey>> {
        Ok(self.keys.list_for_root(root_id).await?)
    }

    /// Starts registration phase 1 with `excludeCredentials` set to the
    /// identity's currently active keys, so the authenticator can't issue
    /// a duplicate credential for an already-registered device.
    pub async fn rotate(&self, root_id: Uuid) -> AuthResult<RegistrationChallenge> {
        self.webauthn.start_rotation(root_id).await
    }

    /// Refuses with a conflict when revoking `key_id` would leave `root_id`
    /// with zero active keys (spec §3 AuthKey invariant).
    pub async fn revoke(&self, root_id: Uuid, key_id: Uuid) -> AuthResult<DbIdentityEvent> {
        let key = self
            .keys
            .find_by_id(key_id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("auth key {key_id}")))?;

        if key.root_id != root_id {
            return Err(AuthError::NotFound(format!("auth key {key_id}")));
        }

        let active_count = self.keys.count_active_for_root(self.keys.pool(), root_id).await?;
        if key.status == "active" && active_count <= 1 {
            return Err(AuthError::LastActiveKey);
        }

        let mut tx = self.keys.pool().begin().await.map_err(pik_db::DbError::from)?;
        self.keys.revoke(&mut *tx, key_id).await?;
        let event = self
            .ledger
            .append(&mut *tx, root_id, "key.revoked", None, serde_json::json!({ "key_id": key_id }), None)
            .await?;
        tx.commit().await.map_err(|e| AuthError::Db(pik_db::DbError::Query(e)))?;

        Ok(event)
    }
}
