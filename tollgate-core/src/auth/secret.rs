use std::fmt;

use zeroize::Zeroizing;

/// Raw refresh-token value as handed to the client.
///
/// Only ever travels in the HTTP-only cookie. The buffer is wiped on drop
/// and `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshSecret(Zeroizing<String>);

impl RefreshSecret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for RefreshSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefreshSecret(<redacted>)")
    }
}

impl From<String> for RefreshSecret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
