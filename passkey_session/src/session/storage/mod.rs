mod memory;
mod postgres;
mod sqlite;
mod store_type;

pub use memory::InMemorySessionStore;
pub use store_type::{SessionStore, SqlSessionStore};
