use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

/// A sender's private key as supplied by configuration.
///
/// The backing buffer is wiped on drop and `Debug` never prints the key, so
/// a `SecretKey` can sit inside structs that get logged.
#[derive(Clone)]
pub struct SecretKey(Arc<Zeroizing<String>>);

impl SecretKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(Arc::new(Zeroizing::new(key.into().trim().to_string())))
    }

    /// Raw key text. Callers must not log or persist it.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    /// Key text without a leading `0x`.
    pub fn hex_body(&self) -> &str {
        let key = self.expose();
        key.strip_prefix("0x")
            .or_else(|| key.strip_prefix("0X"))
            .unwrap_or(key)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}
