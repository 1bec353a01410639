pub mod audit;
pub mod refresh_token;
pub mod revocation_reason;
pub mod user;

pub use audit::AdminAudit;
pub use refresh_token::RefreshTokenRecord;
pub use revocation_reason::RevocationReason;
pub use user::{Role, User, ValidationError};
