mod memory;
mod postgres;
mod sqlite;
mod store_type;

pub use memory::InMemoryCredentialStore;
pub use store_type::{CredentialStore, SqlUserStore};
