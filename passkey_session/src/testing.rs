//! Test support shared with downstream crates, enabled by the `test-utils`
//! feature: a deterministic [`CeremonyEngine`] whose client answers are
//! plain JSON.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::coordination::CeremonyStart;
use crate::engine::{CeremonyChallenge, CeremonyEngine, EngineError, counter_suggests_clone};
use crate::session::CeremonyState;
use crate::userdb::{Credential, UserIdentity};

/// Every begin issues a fresh `"{kind}-{n}"` challenge, and a finish accepts
/// a JSON response that echoes it back.
#[derive(Default)]
pub struct FakeEngine {
    counter: AtomicU64,
}

#[derive(Serialize, Deserialize)]
struct FakeResponse {
    challenge: String,
    credential_id: String,
    #[serde(default)]
    sign_count: u32,
    #[serde(default)]
    forged: bool,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// A valid client answer to `start`.
    pub fn response(start: &CeremonyStart, credential_id: &str, sign_count: u32) -> Vec<u8> {
        Self::answer(&start.options, credential_id, sign_count)
    }

    /// A valid client answer to the options a begin endpoint returned.
    pub fn answer(options: &serde_json::Value, credential_id: &str, sign_count: u32) -> Vec<u8> {
        Self::encode(options, credential_id, sign_count, false)
    }

    /// An answer whose signature does not verify.
    pub fn forged(start: &CeremonyStart, credential_id: &str) -> Vec<u8> {
        Self::encode(&start.options, credential_id, 0, true)
    }

    fn encode(
        options: &serde_json::Value,
        credential_id: &str,
        sign_count: u32,
        forged: bool,
    ) -> Vec<u8> {
        serde_json::to_vec(&FakeResponse {
            challenge: options["challenge"].as_str().unwrap_or_default().to_string(),
            credential_id: credential_id.to_string(),
            sign_count,
            forged,
        })
        .unwrap_or_default()
    }

    fn issue(&self, kind: &str) -> CeremonyChallenge {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let challenge = format!("{kind}-{n}");
        CeremonyChallenge {
            options: serde_json::json!({ "challenge": challenge }),
            state: CeremonyState(serde_json::json!({ "kind": kind, "challenge": challenge })),
        }
    }

    fn verify(
        kind: &str,
        state: &CeremonyState,
        response: &[u8],
    ) -> Result<FakeResponse, EngineError> {
        let response: FakeResponse = serde_json::from_slice(response)
            .map_err(|e| EngineError::Rejected(format!("malformed response: {e}")))?;

        if state.0["kind"] != kind {
            return Err(EngineError::Rejected(format!("not a {kind} ceremony")));
        }
        if state.0["challenge"] != response.challenge.as_str() {
            return Err(EngineError::Rejected("challenge mismatch".to_string()));
        }
        if response.forged {
            return Err(EngineError::Rejected("bad signature".to_string()));
        }
        Ok(response)
    }
}

#[async_trait]
impl CeremonyEngine for FakeEngine {
    async fn begin_registration(
        &self,
        _user: &UserIdentity,
    ) -> Result<CeremonyChallenge, EngineError> {
        Ok(self.issue("registration"))
    }

    async fn finish_registration(
        &self,
        _user: &UserIdentity,
        state: &CeremonyState,
        response: &[u8],
    ) -> Result<Credential, EngineError> {
        let response = Self::verify("registration", state, response)?;
        let mut credential =
            Credential::new(response.credential_id.into_bytes(), b"fake-key".to_vec());
        credential.authenticator.sign_count = response.sign_count;
        Ok(credential)
    }

    async fn begin_login(&self, user: &UserIdentity) -> Result<CeremonyChallenge, EngineError> {
        if user.credentials.is_empty() {
            return Err(EngineError::Rejected("no credentials".to_string()));
        }
        Ok(self.issue("login"))
    }

    async fn finish_login(
        &self,
        user: &UserIdentity,
        state: &CeremonyState,
        response: &[u8],
    ) -> Result<Credential, EngineError> {
        let response = Self::verify("login", state, response)?;
        let mut credential = user
            .credential(response.credential_id.as_bytes())
            .cloned()
            .ok_or_else(|| EngineError::Rejected("unknown credential".to_string()))?;

        let previous = credential.authenticator.sign_count;
        credential.authenticator.clone_warning =
            counter_suggests_clone(previous, response.sign_count);
        credential.authenticator.sign_count = response.sign_count;
        Ok(credential)
    }
}
