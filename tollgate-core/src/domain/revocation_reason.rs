use std::fmt;
use std::str::FromStr;

/// Canonical reasons for revoking a refresh token.
///
/// Recorded alongside the durable revoked flag for operators; clients only
/// ever see a uniform rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RevocationReason {
    /// Consumed by a successful refresh and replaced.
    Rotation,
    /// User explicitly logged out of this session.
    UserLogout,
    /// User asked to end every session.
    LogoutEverywhere,
    /// User-initiated password change.
    PasswordChange,
    /// Revoked by an operator.
    AdminRevoked,
}

impl RevocationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rotation => "rotation",
            Self::UserLogout => "user_logout",
            Self::LogoutEverywhere => "logout_everywhere",
            Self::PasswordChange => "password_change",
            Self::AdminRevoked => "admin_revoked",
        }
    }
}

impl fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RevocationReason {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "rotation" => Ok(Self::Rotation),
            "user_logout" => Ok(Self::UserLogout),
            "logout_everywhere" => Ok(Self::LogoutEverywhere),
            "password_change" => Ok(Self::PasswordChange),
            "admin_revoked" => Ok(Self::AdminRevoked),
            other => Err(format!("unknown revocation reason: {other}")),
        }
    }
}
