//! Named challenges issued by login modules, and the responder that answers them from a
//! single credential attempt.

use std::fmt::{Display, Formatter};

use super::credential::{CredentialRequest, Proof, PublicKey, Secret};
use crate::error::{LoginError, LoginResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChallengeKind {
    Name,
    Password,
    PublicKey,
    TextInput,
    Confirmation,
    TextOutput,
    Otp,
}

impl ChallengeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeKind::Name => "name",
            ChallengeKind::Password => "password",
            ChallengeKind::PublicKey => "public_key",
            ChallengeKind::TextInput => "text_input",
            ChallengeKind::Confirmation => "confirmation",
            ChallengeKind::TextOutput => "text_output",
            ChallengeKind::Otp => "otp",
        }
    }
}

impl Display for ChallengeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone)]
pub enum Challenge {
    Name { prompt: String, name: Option<String> },
    Password { prompt: String, echo_on: bool, password: Option<Secret> },
    PublicKey { public_key: Option<PublicKey> },
    TextInput { prompt: String, text: Option<String> },
    Confirmation { prompt: String, options: Vec<String>, selected: Option<usize> },
    TextOutput { message: String },
    Otp { prompt: String, code: Option<Secret> },
}

impl Challenge {
    pub fn name(prompt: &str) -> Self { Challenge::Name { prompt: prompt.to_string(), name: None } }

    pub fn password(prompt: &str) -> Self {
        Challenge::Password { prompt: prompt.to_string(), echo_on: false, password: None }
    }

    pub fn public_key() -> Self { Challenge::PublicKey { public_key: None } }

    pub fn otp(prompt: &str) -> Self { Challenge::Otp { prompt: prompt.to_string(), code: None } }

    pub fn kind(&self) -> ChallengeKind {
        match self {
            Challenge::Name { .. } => ChallengeKind::Name,
            Challenge::Password { .. } => ChallengeKind::Password,
            Challenge::PublicKey { .. } => ChallengeKind::PublicKey,
            Challenge::TextInput { .. } => ChallengeKind::TextInput,
            Challenge::Confirmation { .. } => ChallengeKind::Confirmation,
            Challenge::TextOutput { .. } => ChallengeKind::TextOutput,
            Challenge::Otp { .. } => ChallengeKind::Otp,
        }
    }

    pub fn answered_name(&self) -> Option<&str> {
        match self { Challenge::Name { name, .. } => name.as_deref(), _ => None }
    }

    pub fn answered_password(&self) -> Option<&Secret> {
        match self { Challenge::Password { password, .. } => password.as_ref(), _ => None }
    }

    pub fn answered_public_key(&self) -> Option<&PublicKey> {
        match self { Challenge::PublicKey { public_key } => public_key.as_ref(), _ => None }
    }
}

/// Answers challenges in place. Implemented by the bridge, driven by login modules.
pub trait ChallengeHandler {
    fn handle(&self, challenges: &mut [Challenge]) -> LoginResult<()>;
}

/// Answers from one `CredentialRequest`. Only the proof the request carries can be given;
/// every other challenge kind fails the attempt.
pub struct CredentialResponder<'a> {
    request: &'a CredentialRequest,
}

impl<'a> CredentialResponder<'a> {
    pub fn new(request: &'a CredentialRequest) -> Self { Self { request } }
}

impl ChallengeHandler for CredentialResponder<'_> {
    fn handle(&self, challenges: &mut [Challenge]) -> LoginResult<()> {
        for challenge in challenges.iter_mut() {
            match (challenge, &self.request.proof) {
                (Challenge::Name { name, .. }, _) => {
                    *name = Some(self.request.identity.clone());
                }
                (Challenge::Password { password, .. }, Proof::Secret(secret)) => {
                    *password = Some(secret.clone());
                }
                (Challenge::PublicKey { public_key }, Proof::PublicKey(key)) => {
                    *public_key = Some(key.clone());
                }
                (other, _) => return Err(LoginError::UnsupportedChallenge(other.kind())),
            }
        }
        Ok(())
    }
}
