mod storage;
mod types;

pub use storage::{CredentialStore, InMemoryCredentialStore, SqlUserStore};
pub use types::{Authenticator, Credential, CredentialFlags, CredentialSummary, UserId, UserIdentity};
