//! WebAuthn Level 2 registration and authentication ceremonies (spec §4.6).
//!
//! Ceremony state (`PasskeyRegistration`/`PasskeyAuthentication`) is
//! serialized into `WebAuthnChallenge.metadata` rather than kept in
//! process memory or a server-side session — the kernel is stateless
//! between requests, so phase 2 of a ceremony may land on a different
//! worker than phase 1. This relies on webauthn-rs's
//! `danger-allow-state-serialisation` feature; the state never leaves the
//! server, so the usual "danger" caveat (don't hand it to the client)
//! does not apply here.

use base64::Engine;
use chrono::Utc;
use pik_db::{AuthKeyRepo, DbAuthKey, DbIdentityEvent, DbSource, IdentityRepo, SourceRepo};
use pik_ledger::Ledger;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::Postgres;
use uuid::Uuid;
use webauthn_rs::prelude::*;

use crate::config::WebAuthnSettings;
use crate::error::{AuthError, AuthResult};
use crate::session::{IssuedSession, SessionIssuer};

const CHALLENGE_TTL_SECS: i64 = 300;

pub struct RegistrationChallenge {
    pub challenge_id: Uuid,
    pub options: CreationChallengeResponse,
}

pub struct AuthenticationChallenge {
    pub challenge_id: Uuid,
    pub options: RequestChallengeResponse,
}

pub struct RegistrationOutcome {
    pub root_id: Uuid,
    pub key_id: Uuid,
    pub hero_name: String,
    pub session: IssuedSession,
    pub link_id: Option<Uuid>,
    /// Ledger rows appended in the same transaction as the registration
    /// write, in append order — `identity.enrolled` (first-time only),
    /// `key.registered`, then `source.link_granted` (if linked). The
    /// caller publishes each after this call returns.
    pub events: Vec<DbIdentityEvent>,
}

pub struct AuthenticationOutcome {
    pub root_id: Uuid,
    pub key_id: Uuid,
    pub session: IssuedSession,
    pub event: DbIdentityEvent,
}

/// What phase-1 registration metadata carries through to phase-2, besides
/// the library's own ceremony state.
#[derive(Debug, Serialize, Deserialize)]
struct RegistrationMeta {
    hero_name: Option<String>,
    fate_alignment: Option<String>,
    origin: Option<String>,
    enrolled_by: Option<String>,
    source_id: Option<String>,
    rotation_root_id: Option<Uuid>,
    registration_state: PasskeyRegistration,
}

#[derive(Debug, Serialize, Deserialize)]
struct AuthenticationMeta {
    authentication_state: PasskeyAuthentication,
}

#[derive(Clone)]
pub struct WebAuthnEngine {
    webauthn: std::sync::Arc<Webauthn>,
    identities: IdentityRepo,
    auth_keys: AuthKeyRepo,
    sources: SourceRepo,
    sessions: SessionIssuer,
    ledger: Ledger,
}

impl WebAuthnEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: WebAuthnSettings,
        identities: IdentityRepo,
        auth_keys: AuthKeyRepo,
        sources: SourceRepo,
        sessions: SessionIssuer,
        ledger: Ledger,
    ) -> AuthResult<Self> {
        let origin = Url::parse(&settings.origin)
            .map_err(|e| AuthError::InvalidInput(format!("invalid WEBAUTHN_ORIGIN: {e}")))?;
        let webauthn = WebauthnBuilder::new(&settings.rp_id, &origin)
            .map_err(|e| AuthError::VerificationFailed(e.to_string()))?
            .rp_name(&settings.rp_name)
            .build()
            .map_err(|e| AuthError::VerificationFailed(e.to_string()))?;

        Ok(Self {
            webauthn: std::sync::Arc::new(webauthn),
            identities,
            auth_keys,
            sources,
            sessions,
            ledger,
        })
    }

    // -- Registration --------------------------------------------------

    /// Phase 1 for first-time enrollment.
    #[allow(clippy::too_many_arguments)]
    pub async fn start_enrollment(
        &self,
        hero_name: &str,
        fate_alignment: &str,
        origin: Option<&str>,
        enrolled_by: &str,
        source_id: Option<&str>,
    ) -> AuthResult<RegistrationChallenge> {
        let user_unique_id = Uuid::new_v4();
        let (ccr, reg_state) = self
            .webauthn
            .start_passkey_registration(user_unique_id, hero_name, hero_name, None)
            .map_err(|e| AuthError::VerificationFailed(e.to_string()))?;

        let meta = RegistrationMeta {
            hero_name: Some(hero_name.to_string()),
            fate_alignment: Some(fate_alignment.to_string()),
            origin: origin.map(str::to_string),
            enrolled_by: Some(enrolled_by.to_string()),
            source_id: source_id.map(str::to_string),
            rotation_root_id: None,
            registration_state: reg_state,
        };

        self.persist_registration_challenge(&ccr, meta).await
    }

    /// Phase 1 for adding a new key to an existing identity (spec §4.7
    /// rotation delegates here with `excludeCredentials`).
    pub async fn start_rotation(&self, root_id: Uuid) -> AuthResult<RegistrationChallenge> {
        let identity = self
            .identities
            .find_by_id(root_id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("root identity {root_id}")))?;

        let active_keys = self.auth_keys.active_for_root(root_id).await?;
        let exclude: Vec<CredentialID> = active_keys
            .iter()
            .filter_map(|k| decode_credential_id(&k.credential_id).ok())
            .collect();

        let (ccr, reg_state) = self
            .webauthn
            .start_passkey_registration(root_id, &identity.hero_name, &identity.hero_name, Some(exclude))
            .map_err(|e| AuthError::VerificationFailed(e.to_string()))?;

        let meta = RegistrationMeta {
            hero_name: None,
            fate_alignment: None,
            origin: None,
            enrolled_by: None,
            source_id: None,
            rotation_root_id: Some(root_id),
            registration_state: reg_state,
        };

        self.persist_registration_challenge(&ccr, meta).await
    }

    async fn persist_registration_challenge(
        &self,
        ccr: &CreationChallengeResponse,
        meta: RegistrationMeta,
    ) -> AuthResult<RegistrationChallenge> {
        let challenge_str =
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(ccr.public_key.challenge.as_ref());
        let metadata = serde_json::to_value(&meta)?;
        let row = self
            .auth_keys
            .create_challenge(
                self.auth_keys.pool(),
                &challenge_str,
                "registration",
                meta.rotation_root_id,
                Some(metadata),
                CHALLENGE_TTL_SECS,
            )
            .await?;

        Ok(RegistrationChallenge { challenge_id: row.id, options: ccr.clone() })
    }

    /// Phase 2: verifies the attestation and, on success, creates the
    /// identity (or attaches the key) plus a session in one transaction.
    pub async fn finish_registration(&self, credential: Value) -> AuthResult<RegistrationOutcome> {
        let challenge_str = extract_client_data_challenge(&credential)?;
        let credential: RegisterPublicKeyCredential = serde_json::from_value(credential)
            .map_err(|e| AuthError::InvalidInput(format!("malformed registration response: {e}")))?;

        let challenge_row = self
            .auth_keys
            .consume_challenge(self.auth_keys.pool(), &challenge_str)
            .await?
            .ok_or(AuthError::UnknownChallenge)?;

        if challenge_row.challenge_type != "registration" {
            return Err(AuthError::UnknownChallenge);
        }
        if challenge_row.expires_at < Utc::now() {
            return Err(AuthError::ChallengeExpired);
        }

        let meta: RegistrationMeta = challenge_row
            .metadata
            .clone()
            .and_then(|v| serde_json::from_value(v).ok())
            .ok_or(AuthError::UnknownChallenge)?;

        let passkey = self
            .webauthn
            .finish_passkey_registration(&credential, &meta.registration_state)
            .map_err(|e| AuthError::VerificationFailed(e.to_string()))?;

        let credential_id = encode_credential_id(passkey.cred_id().as_ref());
        let public_key = serde_json::to_value(&passkey)?;

        let mut tx = self.auth_keys.pool().begin().await.map_err(pik_db::DbError::from)?;
        let mut events = Vec::new();

        let (root_id, hero_name) = if let Some(root_id) = meta.rotation_root_id {
            let identity = self.identities.require(root_id).await?;
            (root_id, identity.hero_name)
        } else {
            let hero_name = meta.hero_name.ok_or(AuthError::InvalidInput("missing hero_name".into()))?;
            let fate_alignment =
                meta.fate_alignment.ok_or(AuthError::InvalidInput("missing fate_alignment".into()))?;
            let enrolled_by =
                meta.enrolled_by.ok_or(AuthError::InvalidInput("missing enrolled_by".into()))?;

            let identity = self
                .identities
                .create(&mut *tx, &hero_name, &fate_alignment, meta.origin.as_deref(), &enrolled_by)
                .await?;
            self.identities.create_persona(&mut *tx, identity.id, &hero_name, true).await?;

            let enrolled_event = self
                .ledger
                .append(
                    &mut *tx,
                    identity.id,
                    "identity.enrolled",
                    None,
                    serde_json::json!({ "hero_name": hero_name, "fate_alignment": fate_alignment }),
                    None,
                )
                .await?;
            events.push(enrolled_event);

            (identity.id, hero_name)
        };

        let auth_key = self
            .auth_keys
            .create(
                &mut *tx,
                root_id,
                &credential_id,
                public_key,
                0,
                None,
                false,
                serde_json::json!([]),
                None,
            )
            .await?;

        let key_registered_event = self
            .ledger
            .append(
                &mut *tx,
                root_id,
                "key.registered",
                None,
                serde_json::json!({ "key_id": auth_key.id, "credential_id": credential_id }),
                None,
            )
            .await?;
        events.push(key_registered_event);

        let link_id = if let Some(source_id) = meta.source_id.as_deref() {
            if let Some(source) = self.find_active_source(&mut tx, source_id).await? {
                let link = self
                    .sources
                    .create_link(&mut *tx, root_id, &source.id, "progression.write", "webauthn_enrollment")
                    .await?;

                let link_event = self
                    .ledger
                    .append(
                        &mut *tx,
                        root_id,
                        "source.link_granted",
                        Some(source.id.as_str()),
                        serde_json::json!({ "scope": "progression.write", "granted_by": "webauthn_enrollment" }),
                        None,
                    )
                    .await?;
                events.push(link_event);

                Some(link.id)
            } else {
                None
            }
        } else {
            None
        };

        let session = self.sessions.issue(&mut *tx, root_id).await?;

        tx.commit().await.map_err(|e| AuthError::Db(pik_db::DbError::Query(e)))?;

        Ok(RegistrationOutcome { root_id, key_id: auth_key.id, hero_name, session, link_id, events })
    }

    async fn find_active_source(
        &self,
        tx: &mut sqlx::Transaction<'_, Postgres>,
        source_id: &str,
    ) -> AuthResult<Option<DbSource>> {
        let source = sqlx::query_as::<_, DbSource>(
            "SELECT id, name, status, api_key_hash, created_at FROM sources WHERE id = $1 AND status = 'active'",
        )
        .bind(source_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(pik_db::DbError::from)?;
        Ok(source)
    }

    // -- Authentication --------------------------------------------------

    pub async fn start_authentication(&self, root_id: Option<Uuid>) -> AuthResult<AuthenticationChallenge> {
        let passkeys: Vec<Passkey> = match root_id {
            Some(root_id) => {
                let keys = self.auth_keys.active_for_root(root_id).await?;
                keys.iter().filter_map(|k| serde_json::from_value(k.public_key.clone()).ok()).collect()
            }
            None => Vec::new(),
        };

        let (rcr, auth_state) = self
            .webauthn
            .start_passkey_authentication(&passkeys)
            .map_err(|e| AuthError::VerificationFailed(e.to_string()))?;

        let meta = AuthenticationMeta { authentication_state: auth_state };
        let challenge_str =
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(rcr.public_key.challenge.as_ref());
        let metadata = serde_json::to_value(&meta)?;

        let row = self
            .auth_keys
            .create_challenge(
                self.auth_keys.pool(),
                &challenge_str,
                "authentication",
                root_id,
                Some(metadata),
                CHALLENGE_TTL_SECS,
            )
            .await?;

        Ok(AuthenticationChallenge { challenge_id: row.id, options: rcr })
    }

    pub async fn finish_authentication(&self, credential: Value) -> AuthResult<AuthenticationOutcome> {
        let challenge_str = extract_client_data_challenge(&credential)?;
        let credential: PublicKeyCredential = serde_json::from_value(credential)
            .map_err(|e| AuthError::InvalidInput(format!("malformed authentication response: {e}")))?;

        let challenge_row = self
            .auth_keys
            .consume_challenge(self.auth_keys.pool(), &challenge_str)
            .await?
            .ok_or(AuthError::UnknownChallenge)?;

        if challenge_row.challenge_type != "authentication" {
            return Err(AuthError::UnknownChallenge);
        }
        if challenge_row.expires_at < Utc::now() {
            return Err(AuthError::ChallengeExpired);
        }

        let meta: AuthenticationMeta = challenge_row
            .metadata
            .clone()
            .and_then(|v| serde_json::from_value(v).ok())
            .ok_or(AuthError::UnknownChallenge)?;

        let credential_id = encode_credential_id(credential.raw_id.as_ref());
        let key = self
            .auth_keys
            .find_by_credential_id(&credential_id)
            .await?
            .ok_or(AuthError::VerificationFailed("unknown credential".into()))?;

        if key.status != "active" {
            return Err(AuthError::VerificationFailed("credential revoked".into()));
        }
        let identity = self.identities.require(key.root_id).await?;
        if identity.status != "active" {
            return Err(AuthError::VerificationFailed("identity not active".into()));
        }

        let auth_result = self
            .webauthn
            .finish_passkey_authentication(&credential, &meta.authentication_state)
            .map_err(|e| AuthError::VerificationFailed(e.to_string()))?;

        let new_counter = auth_result.counter() as i64;
        if key.counter > 0 && new_counter <= key.counter {
            return Err(AuthError::CounterRegression);
        }

        let mut tx = self.auth_keys.pool().begin().await.map_err(pik_db::DbError::from)?;
        self.auth_keys.update_counter_and_last_used(&mut *tx, key.id, new_counter).await?;
        let session = self.sessions.issue(&mut *tx, key.root_id).await?;
        let event = self
            .ledger
            .append(
                &mut *tx,
                key.root_id,
                "identity.authenticated",
                None,
                serde_json::json!({ "key_id": key.id }),
                None,
            )
            .await?;
        tx.commit().await.map_err(|e| AuthError::Db(pik_db::DbError::Query(e)))?;

        Ok(AuthenticationOutcome { root_id: key.root_id, key_id: key.id, session, event })
    }
}

fn encode_credential_id(bytes: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn decode_credential_id(s: &str) -> AuthResult<CredentialID> {
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| AuthError::InvalidInput(format!("bad credential id: {e}")))?;
    Ok(CredentialID::from(bytes))
}

/// Decodes `response.clientDataJSON` (base64url, per the WebAuthn wire
/// format) far enough to recover the embedded challenge, which is how a
/// phase-2 attempt is correlated back to its phase-1 challenge row.
fn extract_client_data_challenge(credential: &Value) -> AuthResult<String> {
    let client_data_b64 = credential
        .get("response")
        .and_then(|r| r.get("clientDataJSON"))
        .and_then(Value::as_str)
        .ok_or_else(|| AuthError::InvalidInput("missing clientDataJSON".into()))?;

    let raw = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(client_data_b64)
        .or_else(|_| base64::engine::general_purpose::STANDARD.decode(client_data_b64))
        .map_err(|e| AuthError::InvalidInput(format!("bad clientDataJSON: {e}")))?;

    let parsed: Value = serde_json::from_slice(&raw)
        .map_err(|e| AuthError::InvalidInput(format!("clientDataJSON is not JSON: {e}")))?;

    parsed
        .get("challenge")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AuthError::InvalidInput("clientDataJSON missing challenge".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_id_roundtrips_through_base64url() {
        let original = vec![1u8, 2, 3, 250, 255];
        let encoded = encode_credential_id(&original);
        let decoded = decode_credential_id(&encoded).unwrap();
        assert_eq!(decoded.as_ref(), original.as_slice());
    }

    #[test]
    fn extracts_challenge_from_client_data_json() {
        let inner = serde_json::json!({"type": "webauthn.create", "challenge": "abc123", "origin": "https://example.test"});
        let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(inner.to_string());
        let credential = serde_json::json!({"response": {"clientDataJSON": encoded}});
        assert_eq!(extract_client_data_challenge(&credential).unwrap(), "abc123");
    }

    #[test]
    fn rejects_missing_client_data_json() {
        let credential = serde_json::json!({"response": {}});
        assert!(extract_client_data_challenge(&credential).is_err());
    }
}
