//! Ceremony engine backed by webauthn-rs passkeys

use async_trait::async_trait;
use std::env;
use webauthn_rs::prelude::*;

use crate::session::CeremonyState;
use crate::userdb::{Credential, UserIdentity};

use super::{CeremonyChallenge, CeremonyEngine, EngineError, counter_suggests_clone};

/// The serialized `Passkey` travels in `Credential::public_key`.
pub struct WebauthnEngine {
    webauthn: Webauthn,
}

impl WebauthnEngine {
    pub fn new(rp_id: &str, origin: &str, rp_name: &str) -> Result<Self, EngineError> {
        let origin_url = Url::parse(origin)
            .map_err(|e| EngineError::Config(format!("Invalid origin '{origin}': {e}")))?;

        let webauthn = WebauthnBuilder::new(rp_id, &origin_url)
            .map_err(|e| EngineError::Config(e.to_string()))?
            .rp_name(rp_name)
            .build()
            .map_err(|e| EngineError::Config(e.to_string()))?;

        tracing::info!(rp_id, origin, "WebAuthn engine configured");
        Ok(Self { webauthn })
    }

    /// Read `ORIGIN`, `PASSKEY_RP_ID` (defaults to the origin host) and
    /// `PASSKEY_RP_NAME` (defaults to the RP id).
    pub fn from_env() -> Result<Self, EngineError> {
        let origin =
            env::var("ORIGIN").map_err(|_| EngineError::Config("ORIGIN must be set".to_string()))?;

        let rp_id = match env::var("PASSKEY_RP_ID") {
            Ok(id) => id,
            Err(_) => Url::parse(&origin)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .ok_or_else(|| EngineError::Config(format!("Cannot derive RP id from '{origin}'")))?,
        };
        let rp_name = env::var("PASSKEY_RP_NAME").unwrap_or_else(|_| rp_id.clone());

        Self::new(&rp_id, &origin, &rp_name)
    }

    fn user_uuid(user: &UserIdentity) -> Result<Uuid, EngineError> {
        Uuid::from_slice(user.id.as_bytes())
            .map_err(|e| EngineError::Rejected(format!("User id is not a UUID: {e}")))
    }

    fn passkeys(user: &UserIdentity) -> Result<Vec<Passkey>, EngineError> {
        user.credentials
            .iter()
            .map(|c| serde_json::from_slice::<Passkey>(&c.public_key))
            .collect::<Result<_, _>>()
            .map_err(|e| EngineError::State(format!("Stored passkey is unreadable: {e}")))
    }
}

#[async_trait]
impl CeremonyEngine for WebauthnEngine {
    async fn begin_registration(
        &self,
        user: &UserIdentity,
    ) -> Result<CeremonyChallenge, EngineError> {
        let exclude: Vec<CredentialID> = user
            .credentials
            .iter()
            .map(|c| CredentialID::from(c.id.clone()))
            .collect();
        let exclude = (!exclude.is_empty()).then_some(exclude);

        let (ccr, registration) = self
            .webauthn
            .start_passkey_registration(
                Self::user_uuid(user)?,
                &user.name,
                &user.display_name,
                exclude,
            )
            .map_err(|e| EngineError::Rejected(e.to_string()))?;

        Ok(CeremonyChallenge {
            options: serde_json::to_value(&ccr)?,
            state: CeremonyState(serde_json::to_value(&registration)?),
        })
    }

    async fn finish_registration(
        &self,
        _user: &UserIdentity,
        state: &CeremonyState,
        response: &[u8],
    ) -> Result<Credential, EngineError> {
        let registration: PasskeyRegistration = serde_json::from_value(state.0.clone())?;
        let response: RegisterPublicKeyCredential = serde_json::from_slice(response)
            .map_err(|e| EngineError::Rejected(format!("Malformed registration response: {e}")))?;

        let passkey = self
            .webauthn
            .finish_passkey_registration(&response, &registration)
            .map_err(|e| EngineError::Rejected(e.to_string()))?;

        let id: &[u8] = passkey.cred_id().as_ref();
        let mut credential = Credential::new(id.to_vec(), serde_json::to_vec(&passkey)?);
        // Passkey registration always requires user presence and verification
        credential.flags.user_present = true;
        credential.flags.user_verified = true;
        Ok(credential)
    }

    async fn begin_login(&self, user: &UserIdentity) -> Result<CeremonyChallenge, EngineError> {
        let passkeys = Self::passkeys(user)?;
        if passkeys.is_empty() {
            return Err(EngineError::Rejected(
                "User has no registered credentials".to_string(),
            ));
        }

        let (rcr, authentication) = self
            .webauthn
            .start_passkey_authentication(&passkeys)
            .map_err(|e| EngineError::Rejected(e.to_string()))?;

        Ok(CeremonyChallenge {
            options: serde_json::to_value(&rcr)?,
            state: CeremonyState(serde_json::to_value(&authentication)?),
        })
    }

    async fn finish_login(
        &self,
        user: &UserIdentity,
        state: &CeremonyState,
        response: &[u8],
    ) -> Result<Credential, EngineError> {
        let authentication: PasskeyAuthentication = serde_json::from_value(state.0.clone())?;
        let response: PublicKeyCredential = serde_json::from_slice(response)
            .map_err(|e| EngineError::Rejected(format!("Malformed assertion: {e}")))?;

        let result = self
            .webauthn
            .finish_passkey_authentication(&response, &authentication)
            .map_err(|e| EngineError::Rejected(e.to_string()))?;

        let id: &[u8] = result.cred_id().as_ref();
        let mut credential = user
            .credential(id)
            .cloned()
            .ok_or_else(|| EngineError::Rejected("Unknown credential".to_string()))?;

        let mut passkey: Passkey = serde_json::from_slice(&credential.public_key)?;
        passkey.update_credential(&result);
        credential.public_key = serde_json::to_vec(&passkey)?;

        let previous = credential.authenticator.sign_count;
        credential.authenticator.clone_warning = counter_suggests_clone(previous, result.counter());
        credential.authenticator.sign_count = result.counter();
        credential.flags.user_present = true;
        credential.flags.user_verified = result.user_verified();
        credential.flags.backup_eligible = result.backup_eligible();
        credential.flags.backup_state = result.backup_state();

        Ok(credential)
    }
}
