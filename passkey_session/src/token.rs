//! Session token generation

use crate::utils::{UtilError, gen_random_string};

/// Number of random bytes behind every session token.
pub const SESSION_TOKEN_BYTES: usize = 32;

/// Source of unguessable, URL-safe session tokens.
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> Result<String, UtilError>;
}

/// Token generator backed by the operating system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomTokenGenerator;

impl TokenGenerator for RandomTokenGenerator {
    fn generate(&self) -> Result<String, UtilError> {
        gen_random_string(SESSION_TOKEN_BYTES)
    }
}
