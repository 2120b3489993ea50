pub mod principal;
pub mod role;
pub mod session;

pub use principal::{Credential, CredentialSpec, Principal, PrincipalResponse, PrincipalStatus};
pub use role::{Provider, RoleType};
pub use session::{Session, SessionTokenPair};
