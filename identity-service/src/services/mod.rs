pub mod error;
pub mod identity;
pub mod ledger;
pub mod token;

pub use error::IdentityError;
pub use identity::IdentityService;
pub use ledger::{LedgerError, SessionLedger};
pub use token::{AccessClaims, TokenCodec, TokenError};
