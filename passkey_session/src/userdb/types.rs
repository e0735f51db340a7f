use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::{base64url_bytes, base64url_encode};

/// Opaque, stable identifier of a user account.
///
/// Minted randomly at account creation; the human-readable `name` is a separate attribute.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(#[serde(with = "base64url_bytes")] Vec<u8>);

impl UserId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// A fresh random identity.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().as_bytes().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64url(&self) -> String {
        base64url_encode(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64url())
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.to_base64url())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialFlags {
    pub user_present: bool,
    pub user_verified: bool,
    pub backup_eligible: bool,
    pub backup_state: bool,
}

/// Authenticator metadata reported by the ceremony engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authenticator {
    #[serde(with = "base64url_bytes")]
    pub aaguid: Vec<u8>,
    pub sign_count: u32,
    pub clone_warning: bool,
    pub attachment: String,
}

/// A registered public-key credential.
///
/// Only `id` and `authenticator.clone_warning` are interpreted here, the rest is
/// carried for the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(with = "base64url_bytes")]
    pub id: Vec<u8>,
    #[serde(with = "base64url_bytes")]
    pub public_key: Vec<u8>,
    pub attestation_type: String,
    #[serde(default)]
    pub transport: Vec<String>,
    #[serde(default)]
    pub flags: CredentialFlags,
    #[serde(default)]
    pub authenticator: Authenticator,
}

impl Credential {
    pub fn new(id: impl Into<Vec<u8>>, public_key: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            public_key: public_key.into(),
            attestation_type: "none".to_string(),
            transport: Vec::new(),
            flags: CredentialFlags::default(),
            authenticator: Authenticator::default(),
        }
    }

    pub fn clone_warning(&self) -> bool {
        self.authenticator.clone_warning
    }
}

/// A user account together with its registered credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    pub name: String,
    pub display_name: String,
    /// Registration order
    pub credentials: Vec<Credential>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserIdentity {
    /// A new account with a random id, the display name defaults to `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            id: UserId::generate(),
            display_name: name.clone(),
            name,
            credentials: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn credential(&self, id: &[u8]) -> Option<&Credential> {
        self.credentials.iter().find(|c| c.id == id)
    }

    /// Append a credential, keeping ids unique.
    ///
    /// Returns `false` when an entry with the same id already existed and was
    /// replaced in place.
    pub fn add_credential(&mut self, credential: Credential) -> bool {
        match self.credentials.iter_mut().find(|c| c.id == credential.id) {
            Some(existing) => {
                *existing = credential;
                false
            }
            None => {
                self.credentials.push(credential);
                true
            }
        }
    }

    /// Replace the entry with the same id. Returns `false` when nothing matched.
    pub fn update_credential(&mut self, credential: Credential) -> bool {
        match self.credentials.iter_mut().find(|c| c.id == credential.id) {
            Some(existing) => {
                *existing = credential;
                true
            }
            None => false,
        }
    }
}

/// Credential details safe to hand to the signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialSummary {
    pub credential_id: String,
    pub sign_count: u32,
    pub attachment: String,
    pub user_verified: bool,
    pub backup_eligible: bool,
    pub backup_state: bool,
    pub clone_warning: bool,
}

impl From<&Credential> for CredentialSummary {
    fn from(c: &Credential) -> Self {
        Self {
            credential_id: base64url_encode(&c.id),
            sign_count: c.authenticator.sign_count,
            attachment: c.authenticator.attachment.clone(),
            user_verified: c.flags.user_verified,
            backup_eligible: c.flags.backup_eligible,
            backup_state: c.flags.backup_state,
            clone_warning: c.authenticator.clone_warning,
        }
    }
}
