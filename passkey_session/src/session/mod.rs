mod auth;
mod storage;
mod types;

pub use auth::AuthSessionStore;
pub use storage::{InMemorySessionStore, SessionStore, SqlSessionStore};
pub use types::{AuthSession, CeremonySession, CeremonyState};
