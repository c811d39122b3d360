//! Error model for the authentication bridge.
//! `LoginError` is what login modules and the realm registry return; `DenyReason` is the
//! coarse classification the bridge keeps for logging once an attempt has been refused.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::identity::ChallengeKind;

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("unsupported challenge: {0}")]
    UnsupportedChallenge(ChallengeKind),
    #[error("{0}")]
    Failed(String),
    #[error("no login modules configured for realm '{0}'")]
    UnknownRealm(String),
    #[error("user doesn't have role defined")]
    NoRole,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LoginError {
    pub fn failed<S: Into<String>>(msg: S) -> Self { LoginError::Failed(msg.into()) }

    pub fn code_str(&self) -> &'static str {
        match self {
            LoginError::UnsupportedChallenge(_) => "unsupported_challenge",
            LoginError::Failed(_) => "login_failed",
            LoginError::UnknownRealm(_) => "unknown_realm",
            LoginError::NoRole => "no_role",
            LoginError::Other(_) => "internal",
        }
    }

    pub fn reason(&self) -> DenyReason {
        match self {
            LoginError::UnsupportedChallenge(_) => DenyReason::UnsupportedChallenge,
            LoginError::Failed(_) => DenyReason::Rejected,
            LoginError::NoRole => DenyReason::NoRole,
            LoginError::UnknownRealm(_) | LoginError::Other(_) => DenyReason::Unexpected,
        }
    }
}

/// Why an attempt was refused. Never sent to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    UnsupportedChallenge,
    Rejected,
    NoRole,
    Unexpected,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::UnsupportedChallenge => "unsupported_challenge",
            DenyReason::Rejected => "rejected",
            DenyReason::NoRole => "no_role",
            DenyReason::Unexpected => "unexpected",
        }
    }
}

impl Display for DenyReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type LoginResult<T> = Result<T, LoginError>;
