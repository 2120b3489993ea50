pub mod guard;

pub use guard::{auth_middleware, AuthorizationGuard, CurrentPrincipal, ResourceScope};
