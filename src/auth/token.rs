use std::fmt;
use std::time::Duration;

/// Bearer token issued by the identity provider.
///
/// Tokens compare by value only: a token read back from the cache equals
/// the freshly issued one even though the cached copy has no expiry.
/// `Debug` never prints the secret.
#[derive(Clone)]
pub struct AccessToken {
    value: String,
    expires_in: Option<Duration>,
}

impl AccessToken {
    /// Token with unknown remaining lifetime (e.g. read from the cache).
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expires_in: None,
        }
    }

    /// Token freshly issued with the given lifetime.
    pub fn with_expiry(value: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            value: value.into(),
            expires_in: Some(expires_in),
        }
    }

    pub fn secret(&self) -> &str {
        &self.value
    }

    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_in
    }
}

impl PartialEq for AccessToken {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for AccessToken {}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}
