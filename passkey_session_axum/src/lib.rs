mod config;
mod error;
mod passkey;
mod router;
mod session;

#[cfg(test)]
mod test_utils;

pub use config::HttpConfig;
pub use error::{IntoResponseError, status_for};
pub use router::{passkey_session_router, passkey_session_router_no_trace};
pub use session::{AppState, AuthUser, SessionUserView};
