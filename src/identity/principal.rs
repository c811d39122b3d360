use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum Principal {
    User(String),
    Role(String),
    Group(String),
}

impl Principal {
    pub fn user<S: Into<String>>(name: S) -> Self { Principal::User(name.into()) }
    pub fn role<S: Into<String>>(name: S) -> Self { Principal::Role(name.into()) }
    pub fn group<S: Into<String>>(name: S) -> Self { Principal::Group(name.into()) }

    pub fn name(&self) -> &str {
        match self {
            Principal::User(n) | Principal::Role(n) | Principal::Group(n) => n.as_str(),
        }
    }

    pub fn is_role(&self) -> bool { matches!(self, Principal::Role(_)) }
}

/// Principals granted by a successful login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    #[serde(default)]
    principals: BTreeSet<Principal>,
}

impl Subject {
    pub fn new() -> Self { Self::default() }

    /// Returns false when the principal was already present.
    pub fn add(&mut self, principal: Principal) -> bool { self.principals.insert(principal) }

    pub fn extend<I: IntoIterator<Item = Principal>>(&mut self, principals: I) {
        self.principals.extend(principals);
    }

    pub fn principals(&self) -> impl Iterator<Item = &Principal> { self.principals.iter() }

    pub fn contains(&self, principal: &Principal) -> bool { self.principals.contains(principal) }

    pub fn is_empty(&self) -> bool { self.principals.is_empty() }

    pub fn len(&self) -> usize { self.principals.len() }

    /// First user principal, if any module recorded one.
    pub fn user_name(&self) -> Option<&str> {
        self.principals.iter().find_map(|p| match p {
            Principal::User(n) => Some(n.as_str()),
            _ => None,
        })
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.principals.iter().filter_map(|p| match p {
            Principal::Role(n) => Some(n.as_str()),
            _ => None,
        })
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.principals.iter().filter_map(|p| match p {
            Principal::Group(n) => Some(n.as_str()),
            _ => None,
        })
    }
}

impl FromIterator<Principal> for Subject {
    fn from_iter<I: IntoIterator<Item = Principal>>(iter: I) -> Self {
        Self { principals: iter.into_iter().collect() }
    }
}
