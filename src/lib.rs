pub mod error;
pub mod identity;
pub mod ssh;
pub mod config;

pub use error::{DenyReason, LoginError, LoginResult};
pub use ssh::{Outcome, PasswordAuthenticator, PublickeyAuthenticator, RealmAuthenticator};
