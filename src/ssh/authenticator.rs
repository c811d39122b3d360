use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::debug;

use crate::error::{DenyReason, LoginError};
use crate::identity::{
    bind, has_role, CredentialRequest, CredentialResponder, PublicKey, RealmRegistry, Secret, SessionAttributes,
    Subject,
};

pub const DEFAULT_REALM: &str = "karaf";

/// Password check the transport calls for each password attempt.
pub trait PasswordAuthenticator {
    fn authenticate_password(&self, username: &str, password: &str, session: &dyn SessionAttributes) -> bool;
}

/// Public-key check the transport calls for each key attempt.
pub trait PublickeyAuthenticator {
    fn authenticate_publickey(&self, username: &str, key: &PublicKey, session: &dyn SessionAttributes) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Admitted,
    Denied(DenyReason),
}

impl Outcome {
    pub fn is_admitted(&self) -> bool { matches!(self, Outcome::Admitted) }

    pub fn reason(&self) -> Option<DenyReason> {
        match self { Outcome::Admitted => None, Outcome::Denied(r) => Some(*r) }
    }
}

/// Verifies credentials against a realm and binds the resulting subject to the session.
/// A login that grants no role is refused.
///
/// A panicking login module is denied as unexpected, but the process panic hook still runs
/// first. With the default hook that prints the panic message to stderr; transports that need
/// denials to stay at `debug` should install their own hook with [`std::panic::set_hook`].
pub struct RealmAuthenticator {
    realm: String,
    registry: Arc<RealmRegistry>,
}

impl RealmAuthenticator {
    pub fn new(registry: Arc<RealmRegistry>) -> Self { Self::with_realm(DEFAULT_REALM, registry) }

    pub fn with_realm<S: Into<String>>(realm: S, registry: Arc<RealmRegistry>) -> Self {
        Self { realm: realm.into(), registry }
    }

    pub fn realm(&self) -> &str { &self.realm }

    pub fn set_realm<S: Into<String>>(&mut self, realm: S) { self.realm = realm.into(); }

    pub fn registry(&self) -> &Arc<RealmRegistry> { &self.registry }

    pub fn evaluate_password(&self, username: &str, password: &str, session: &dyn SessionAttributes) -> Outcome {
        let request = CredentialRequest::password(username, Secret::from(password));
        self.evaluate(request, session)
    }

    pub fn evaluate_publickey(&self, username: &str, key: &PublicKey, session: &dyn SessionAttributes) -> Outcome {
        let request = CredentialRequest::public_key(username, key.clone());
        self.evaluate(request, session)
    }

    fn evaluate(&self, request: CredentialRequest, session: &dyn SessionAttributes) -> Outcome {
        match self.verify(&request) {
            Ok(subject) => {
                bind(session, subject);
                Outcome::Admitted
            }
            Err(e) => {
                let reason = e.reason();
                debug!(
                    target: "realm_auth::ssh",
                    user = %request.identity, realm = %self.realm, reason = %reason,
                    "User authentication failed with {}", e
                );
                Outcome::Denied(reason)
            }
        }
    }

    fn verify(&self, request: &CredentialRequest) -> Result<Subject, LoginError> {
        let mut subject = Subject::new();
        let responder = CredentialResponder::new(request);
        // Login modules are pluggable; a panicking one must not take the session thread down.
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.registry.login(&self.realm, &mut subject, &responder)
        }));
        match result {
            Ok(r) => r?,
            Err(payload) => {
                return Err(LoginError::Other(anyhow::anyhow!("login module panicked: {}", panic_message(payload.as_ref()))));
            }
        }
        if !has_role(&subject) {
            return Err(LoginError::NoRole);
        }
        Ok(subject)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic>"
    }
}

impl PasswordAuthenticator for RealmAuthenticator {
    fn authenticate_password(&self, username: &str, password: &str, session: &dyn SessionAttributes) -> bool {
        self.evaluate_password(username, password, session).is_admitted()
    }
}

impl PublickeyAuthenticator for RealmAuthenticator {
    fn authenticate_publickey(&self, username: &str, key: &PublicKey, session: &dyn SessionAttributes) -> bool {
        self.evaluate_publickey(username, key, session).is_admitted()
    }
}
