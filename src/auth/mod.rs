//! Operator authentication: a single shared admin key sent in `X-Admin-Key`.

mod extractor;

use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

pub use extractor::AdminAuth;

/// Configured admin key. Unset means every operator request is refused.
#[derive(Clone)]
pub struct AdminKey(Option<SecretString>);

impl AdminKey {
    pub fn new(key: Option<String>) -> Self {
        Self(key.map(SecretString::from))
    }

    /// Constant-time comparison.
    pub fn verify(&self, provided: &str) -> bool {
        self.0.as_ref().is_some_and(|secret| {
            secret
                .expose_secret()
                .as_bytes()
                .ct_eq(provided.as_bytes())
                .into()
        })
    }
}

impl std::fmt::Debug for AdminKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown = if self.0.is_some() { "[REDACTED]" } else { "None" };
        write!(f, "AdminKey({})", shown)
    }
}
