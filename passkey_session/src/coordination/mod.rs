mod coordinator;
mod errors;
mod login;
mod registration;
mod session;

pub use coordinator::{CeremonyCoordinator, CeremonyStart};
pub use errors::CoordinationError;
pub use login::LoginOutcome;
