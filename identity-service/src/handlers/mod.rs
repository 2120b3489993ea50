pub mod identity;

pub use identity::{join, login, logout, me, refresh};
