use std::env;

const DEFAULT_COOKIE_NAME: &str = "sid";
const DEFAULT_ROUTE_PREFIX: &str = "/api/passkey";

/// Cookie and routing settings for the HTTP surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    /// Cookie carrying the ceremony token, then the authenticated session token
    pub cookie_name: String,
    pub cookie_path: String,
    /// Where the application is expected to nest the passkey router
    pub route_prefix: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie_path: "/".to_string(),
            route_prefix: DEFAULT_ROUTE_PREFIX.to_string(),
        }
    }
}

impl HttpConfig {
    /// Read `SESSION_COOKIE_NAME` and `PASSKEY_ROUTE_PREFIX`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cookie_name: env::var("SESSION_COOKIE_NAME")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.cookie_name),
            cookie_path: defaults.cookie_path,
            route_prefix: env::var("PASSKEY_ROUTE_PREFIX")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.route_prefix),
        }
    }
}
