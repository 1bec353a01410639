pub mod issuer;
pub mod password;
pub mod refresh;
pub mod revocation;
mod secret;
pub mod service;

pub use issuer::{AccessClaims, AccessToken, IssuerError, TokenIssuer};
pub use password::{PasswordError, PasswordHasher};
pub use refresh::{
    IssuedRefresh, RefreshError, RefreshLifecycle, RefreshPolicy, RejectReason,
    Rotation,
};
pub use revocation::{
    BestEffort, InMemoryRevocationCache, RevocationCache, RevocationEvent,
    RevocationPublisher,
};
#[cfg(feature = "database")]
pub use revocation::RedisRevocationCache;
pub use secret::RefreshSecret;
