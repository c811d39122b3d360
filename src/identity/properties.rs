//! File-backed identity source in `users.properties` / `keys.properties` form.
//!
//! ```text
//! # user = password, role | _g_:group ...
//! admin = $argon2id$v=19$..., admin, _g_:admingroup
//! _g_\:admingroup = group, manager
//! ```
//!
//! The keys file uses the same layout with a public key in place of the password.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use tracing::{debug, info, warn};

use super::challenge::{Challenge, ChallengeHandler};
use super::credential::{PublicKey, Secret};
use super::principal::{Principal, Subject};
use super::provider::{ControlFlag, LoginModule, RealmRegistry};
use crate::error::{LoginError, LoginResult};

const GROUP_PREFIX: &str = "_g_:";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Membership {
    roles: Vec<String>,
    groups: Vec<String>,
}

impl Membership {
    fn from_entries<'a, I: IntoIterator<Item = &'a str>>(entries: I) -> Self {
        let mut m = Membership::default();
        for e in entries {
            let e = e.trim();
            if e.is_empty() { continue; }
            match e.strip_prefix(GROUP_PREFIX) {
                Some(g) => m.groups.push(g.to_string()),
                None => m.roles.push(e.to_string()),
            }
        }
        m
    }
}

#[derive(Debug, Clone)]
struct UserEntry {
    password: String,
    membership: Membership,
}

#[derive(Debug, Clone)]
struct KeyEntry {
    key: PublicKey,
    membership: Membership,
}

#[derive(Debug, Clone, Default)]
pub struct UserStore {
    users: HashMap<String, UserEntry>,
    keys: HashMap<String, KeyEntry>,
    groups: HashMap<String, Vec<String>>,
}

impl UserStore {
    pub fn new() -> Self { Self::default() }

    /// Read the users and keys files. A `None` path is skipped; a missing or unreadable file is an error.
    pub fn load(users_file: Option<&Path>, keys_file: Option<&Path>) -> Result<Self> {
        let mut store = UserStore::new();
        if let Some(p) = users_file {
            let text = std::fs::read_to_string(p).with_context(|| format!("reading users file '{}'", p.display()))?;
            store.parse_users(&text);
        }
        if let Some(p) = keys_file {
            let text = std::fs::read_to_string(p).with_context(|| format!("reading keys file '{}'", p.display()))?;
            store.parse_keys(&text);
        }
        info!(target: "realm_auth::properties", users = store.users.len(), keys = store.keys.len(), groups = store.groups.len(), "user store loaded");
        Ok(store)
    }

    pub fn add_user(&mut self, name: &str, password: &str, entries: &[&str]) {
        let membership = Membership::from_entries(entries.iter().copied());
        self.users.insert(name.to_string(), UserEntry { password: password.to_string(), membership });
    }

    pub fn add_key(&mut self, name: &str, key: PublicKey, entries: &[&str]) {
        let membership = Membership::from_entries(entries.iter().copied());
        self.keys.insert(name.to_string(), KeyEntry { key, membership });
    }

    pub fn add_group(&mut self, name: &str, roles: &[&str]) {
        let roles = roles.iter().map(|r| r.trim()).filter(|r| !r.is_empty()).map(str::to_string).collect();
        self.groups.insert(name.to_string(), roles);
    }

    pub fn user_count(&self) -> usize { self.users.len() }

    pub fn key_count(&self) -> usize { self.keys.len() }

    pub fn parse_users(&mut self, text: &str) {
        for (lineno, key, value) in property_lines(text) {
            if let Some(group) = key.strip_prefix(GROUP_PREFIX) {
                self.add_group(group, &split_values(value));
                continue;
            }
            let (password, rest) = split_password(value);
            if password.is_empty() {
                warn!(target: "realm_auth::properties", line = lineno, user = %key, "user entry has no password; skipped");
                continue;
            }
            self.add_user(&key, password, &split_values(rest));
        }
    }

    pub fn parse_keys(&mut self, text: &str) {
        for (lineno, key, value) in property_lines(text) {
            let values = split_values(value);
            if let Some(group) = key.strip_prefix(GROUP_PREFIX) {
                self.add_group(group, &values);
                continue;
            }
            let Some((key_text, rest)) = values.split_first() else {
                warn!(target: "realm_auth::properties", line = lineno, user = %key, "key entry has no key; skipped");
                continue;
            };
            match PublicKey::parse(key_text) {
                Ok(pk) => self.add_key(&key, pk, rest),
                Err(e) => warn!(target: "realm_auth::properties", line = lineno, user = %key, "unreadable public key skipped: {}", e),
            }
        }
    }

    fn grants(&self, membership: &Membership) -> Vec<Principal> {
        let mut out: Vec<Principal> = membership.roles.iter().map(Principal::role).collect();
        for g in membership.groups.iter() {
            out.push(Principal::group(g.as_str()));
            if let Some(roles) = self.groups.get(g) {
                out.extend(roles.iter().map(Principal::role));
            }
        }
        out
    }
}

// Yields (line number, unescaped key, raw value) for every key=value line.
fn property_lines(text: &str) -> impl Iterator<Item = (usize, String, &str)> {
    text.lines().enumerate().filter_map(|(i, raw)| {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') { return None; }
        let Some(eq) = line.find('=') else {
            warn!(target: "realm_auth::properties", line = i + 1, "line without '=' skipped");
            return None;
        };
        let key = line[..eq].trim().replace("\\:", ":");
        Some((i + 1, key, &line[eq + 1..]))
    })
}

fn split_values(value: &str) -> Vec<&str> {
    value.split(',').map(str::trim).filter(|v| !v.is_empty()).collect()
}

// Password is the first comma-separated field, except that a PHC string keeps the commas of its
// parameter field. Returns the password and the unsplit remainder.
fn split_password(value: &str) -> (&str, &str) {
    let trimmed = value.trim_start();
    if let Some(end) = phc_end(trimmed) {
        return (trimmed[..end].trim(), &trimmed[end..]);
    }
    match value.split_once(',') {
        Some((password, rest)) => (password.trim(), rest),
        None => (value.trim(), ""),
    }
}

// `$argon2<variant>[$v=<n>]$<params>$<salt>$<hash>`: the hash field runs to the next comma.
fn phc_end(value: &str) -> Option<usize> {
    if !value.starts_with("$argon2") { return None; }
    let versioned = value[1..].split('$').nth(1).is_some_and(|f| f.starts_with("v="));
    let hash_start = value.match_indices('$').map(|(i, _)| i).nth(if versioned { 4 } else { 3 })? + 1;
    Some(value[hash_start..].find(',').map_or(value.len(), |i| hash_start + i))
}

/// Argon2 PHC string for `password` with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let phc = Argon2::default().hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

// Stored values that look like PHC strings are verified with Argon2, anything else is plain text.
fn verify_password(stored: &str, offered: &Secret) -> bool {
    if stored.starts_with("$argon2") {
        match PasswordHash::new(stored) {
            Ok(parsed) => Argon2::default().verify_password(offered.expose().as_bytes(), &parsed).is_ok(),
            Err(e) => {
                debug!(target: "realm_auth::properties", "stored password hash unreadable: {}", e);
                false
            }
        }
    } else {
        offered.matches(stored)
    }
}

fn missing(what: &str) -> LoginError { LoginError::failed(format!("{} not provided", what)) }

/// Password login against a [`UserStore`].
pub struct PropertiesLoginModule {
    store: Arc<UserStore>,
}

impl PropertiesLoginModule {
    pub fn new(store: Arc<UserStore>) -> Self { Self { store } }
}

impl LoginModule for PropertiesLoginModule {
    fn name(&self) -> &str { "properties" }

    fn login(&self, subject: &mut Subject, handler: &dyn ChallengeHandler) -> LoginResult<()> {
        let mut challenges = [Challenge::name("Username: "), Challenge::password("Password: ")];
        handler.handle(&mut challenges)?;
        let user = challenges[0].answered_name().ok_or_else(|| missing("username"))?;
        let password = challenges[1].answered_password().ok_or_else(|| missing("password"))?;

        let entry = self.store.users.get(user).ok_or_else(|| LoginError::failed("user does not exist"))?;
        if !verify_password(&entry.password, password) {
            return Err(LoginError::failed(format!("password for user {} does not match", user)));
        }
        subject.add(Principal::user(user));
        subject.extend(self.store.grants(&entry.membership));
        Ok(())
    }
}

/// Public-key login against a [`UserStore`].
pub struct PublickeyLoginModule {
    store: Arc<UserStore>,
}

impl PublickeyLoginModule {
    pub fn new(store: Arc<UserStore>) -> Self { Self { store } }
}

impl LoginModule for PublickeyLoginModule {
    fn name(&self) -> &str { "publickey" }

    fn login(&self, subject: &mut Subject, handler: &dyn ChallengeHandler) -> LoginResult<()> {
        let mut challenges = [Challenge::name("Username: "), Challenge::public_key()];
        handler.handle(&mut challenges)?;
        let user = challenges[0].answered_name().ok_or_else(|| missing("username"))?;
        let key = challenges[1].answered_public_key().ok_or_else(|| missing("public key"))?;

        let entry = self
            .store
            .keys
            .get(user)
            .ok_or_else(|| LoginError::failed(format!("user {} does not have a public key", user)))?;
        if entry.key != *key {
            return Err(LoginError::failed(format!("public key for user {} does not match", user)));
        }
        subject.add(Principal::user(user));
        subject.extend(self.store.grants(&entry.membership));
        Ok(())
    }
}

/// Register the standard realm: password module then public-key module, both sufficient.
pub fn register_default_realm(registry: &RealmRegistry, realm: &str, store: Arc<UserStore>) {
    registry.register(realm, ControlFlag::Sufficient, Arc::new(PropertiesLoginModule::new(store.clone())));
    registry.register(realm, ControlFlag::Sufficient, Arc::new(PublickeyLoginModule::new(store)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{ChallengeKind, CredentialRequest, CredentialResponder};

    const USERS: &str = r#"
# users
admin = admin, admin, _g_:admingroup
_g_\:admingroup = group, manager
nobody = nobody
broken
"#;

    fn login(module: &dyn LoginModule, req: &CredentialRequest) -> (LoginResult<()>, Subject) {
        let mut s = Subject::new();
        let r = module.login(&mut s, &CredentialResponder::new(req));
        (r, s)
    }

    #[test]
    fn parses_users_groups_and_skips_malformed_lines() {
        let mut store = UserStore::new();
        store.parse_users(USERS);
        assert_eq!(store.user_count(), 2);
        assert_eq!(store.groups.get("admingroup"), Some(&vec!["group".to_string(), "manager".to_string()]));
        let admin = store.users.get("admin").unwrap();
        assert_eq!(admin.membership.roles, vec!["admin".to_string()]);
        assert_eq!(admin.membership.groups, vec!["admingroup".to_string()]);
    }

    #[test]
    fn password_login_grants_roles_and_group_roles() {
        let mut store = UserStore::new();
        store.parse_users(USERS);
        let m = PropertiesLoginModule::new(Arc::new(store));
        let (r, s) = login(&m, &CredentialRequest::password("admin", Secret::from("admin")));
        r.unwrap();
        assert_eq!(s.user_name(), Some("admin"));
        assert_eq!(s.roles().collect::<Vec<_>>(), vec!["admin", "group", "manager"]);
        assert_eq!(s.groups().collect::<Vec<_>>(), vec!["admingroup"]);
    }

    #[test]
    fn password_login_failures() {
        let mut store = UserStore::new();
        store.parse_users(USERS);
        let m = PropertiesLoginModule::new(Arc::new(store));

        let (r, s) = login(&m, &CredentialRequest::password("admin", Secret::from("wrong")));
        assert_eq!(r.unwrap_err().to_string(), "password for user admin does not match");
        assert!(s.is_empty());

        let (r, _) = login(&m, &CredentialRequest::password("ghost", Secret::from("x")));
        assert_eq!(r.unwrap_err().to_string(), "user does not exist");

        let key = PublicKey::new("ssh-ed25519", vec![1; 4]);
        let (r, _) = login(&m, &CredentialRequest::public_key("admin", key));
        assert!(matches!(r, Err(LoginError::UnsupportedChallenge(ChallengeKind::Password))));
    }

    #[test]
    fn phc_password_keeps_its_parameter_commas() {
        let phc = hash_password("pw").unwrap();
        assert!(phc.contains(','));
        let mut store = UserStore::new();
        store.parse_users(&format!("carol = {}, manager, _g_:ops\n", phc));
        let carol = store.users.get("carol").unwrap();
        assert_eq!(carol.password, phc);
        assert_eq!(carol.membership.roles, vec!["manager".to_string()]);
        assert_eq!(carol.membership.groups, vec!["ops".to_string()]);
        assert!(verify_password(&carol.password, &Secret::from("pw")));

        store.parse_users(&format!("dave = {}\n", phc));
        let dave = store.users.get("dave").unwrap();
        assert_eq!(dave.password, phc);
        assert!(dave.membership.roles.is_empty());
    }

    #[test]
    fn unversioned_phc_and_plain_passwords_split() {
        assert_eq!(split_password(" $argon2i$m=8,t=1,p=1$c2FsdA$aGFzaA , admin"), ("$argon2i$m=8,t=1,p=1$c2FsdA$aGFzaA", ", admin"));
        assert_eq!(split_password("admin, admin, _g_:g"), ("admin", " admin, _g_:g"));
        assert_eq!(split_password(" secret "), ("secret", ""));
        assert_eq!(split_password(" , admin").0, "");
    }

    #[test]
    fn argon2_hashes_verify() {
        let phc = hash_password("s3cret").unwrap();
        assert!(phc.starts_with("$argon2"));
        assert!(verify_password(&phc, &Secret::from("s3cret")));
        assert!(!verify_password(&phc, &Secret::from("S3cret")));
        assert!(!verify_password("$argon2id$garbage", &Secret::from("s3cret")));
    }

    #[test]
    fn key_login_matches_registered_key_only() {
        let registered = PublicKey::new("ssh-ed25519", vec![7; 32]);
        let mut store = UserStore::new();
        store.add_group("viewers", &["viewer"]);
        store.add_key("alice", registered.clone(), &["_g_:viewers"]);
        let m = PublickeyLoginModule::new(Arc::new(store));

        let (r, s) = login(&m, &CredentialRequest::public_key("alice", registered));
        r.unwrap();
        assert_eq!(s.roles().collect::<Vec<_>>(), vec!["viewer"]);

        let other = PublicKey::new("ssh-ed25519", vec![8; 32]);
        let (r, _) = login(&m, &CredentialRequest::public_key("alice", other.clone()));
        assert_eq!(r.unwrap_err().to_string(), "public key for user alice does not match");

        let (r, _) = login(&m, &CredentialRequest::public_key("bob", other));
        assert_eq!(r.unwrap_err().to_string(), "user bob does not have a public key");
    }

    #[test]
    fn keys_file_parsing_skips_bad_keys() {
        let good = PublicKey::new("ssh-ed25519", vec![3; 32]).to_openssh();
        let text = format!("alice = {}, viewer\nbob = not-a-key, admin\n", good);
        let mut store = UserStore::new();
        store.parse_keys(&text);
        assert_eq!(store.key_count(), 1);
        assert!(store.keys.contains_key("alice"));
    }
}
