//! Transport-facing entry points. The SSH server hands every password or public-key attempt
//! to a [`RealmAuthenticator`] and only ever sees admit or deny.

mod authenticator;

pub use authenticator::{Outcome, PasswordAuthenticator, PublickeyAuthenticator, RealmAuthenticator, DEFAULT_REALM};
