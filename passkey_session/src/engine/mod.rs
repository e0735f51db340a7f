//! Boundary to the cryptographic ceremony
//!
//! The coordinator never looks inside options, ceremony state or client
//! responses; it only moves them between the HTTP layer, the engine and the
//! session store.

mod errors;
#[cfg(feature = "webauthn")]
mod webauthn;

use async_trait::async_trait;

use crate::session::CeremonyState;
use crate::userdb::{Credential, UserIdentity};

pub use errors::EngineError;
#[cfg(feature = "webauthn")]
pub use webauthn::WebauthnEngine;

/// Options for the client plus the state needed to verify its answer.
#[derive(Debug, Clone, PartialEq)]
pub struct CeremonyChallenge {
    pub options: serde_json::Value,
    pub state: CeremonyState,
}

#[async_trait]
pub trait CeremonyEngine: Send + Sync {
    async fn begin_registration(&self, user: &UserIdentity)
    -> Result<CeremonyChallenge, EngineError>;

    /// Verify an attestation and return the new credential.
    async fn finish_registration(
        &self,
        user: &UserIdentity,
        state: &CeremonyState,
        response: &[u8],
    ) -> Result<Credential, EngineError>;

    async fn begin_login(&self, user: &UserIdentity) -> Result<CeremonyChallenge, EngineError>;

    /// Verify an assertion and return the used credential with its counter
    /// and clone flag updated.
    async fn finish_login(
        &self,
        user: &UserIdentity,
        state: &CeremonyState,
        response: &[u8],
    ) -> Result<Credential, EngineError>;
}

/// A signature counter that fails to advance means the authenticator may have
/// been cloned. Authenticators that never count report zero both times.
pub fn counter_suggests_clone(previous: u32, current: u32) -> bool {
    (current != 0 || previous != 0) && current <= previous
}
