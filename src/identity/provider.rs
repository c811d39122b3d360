use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::challenge::ChallengeHandler;
use super::principal::Subject;
use crate::error::{LoginError, LoginResult};

/// One identity source inside a realm. A module asks for what it needs through the
/// handler and, on success, records the principals it grants in `subject`.
pub trait LoginModule: Send + Sync {
    fn name(&self) -> &str;
    fn login(&self, subject: &mut Subject, handler: &dyn ChallengeHandler) -> LoginResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlag {
    /// Must succeed; later modules still run.
    Required,
    /// Must succeed; failure ends the login.
    Requisite,
    /// Success ends the login unless a required module already failed.
    Sufficient,
    Optional,
}

impl ControlFlag {
    fn is_mandatory(&self) -> bool { matches!(self, ControlFlag::Required | ControlFlag::Requisite) }
}

struct ModuleEntry {
    flag: ControlFlag,
    module: Arc<dyn LoginModule>,
}

/// Realm name to ordered module stack.
#[derive(Default)]
pub struct RealmRegistry {
    realms: RwLock<HashMap<String, Vec<Arc<ModuleEntry>>>>,
}

impl RealmRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn register(&self, realm: &str, flag: ControlFlag, module: Arc<dyn LoginModule>) {
        info!(target: "realm_auth::realm", realm = %realm, module = %module.name(), ?flag, "login module registered");
        self.realms
            .write()
            .entry(realm.to_string())
            .or_default()
            .push(Arc::new(ModuleEntry { flag, module }));
    }

    /// Drop a realm and all its modules. Returns false if it was not registered.
    pub fn unregister(&self, realm: &str) -> bool { self.realms.write().remove(realm).is_some() }

    pub fn realms(&self) -> Vec<String> {
        let mut names: Vec<String> = self.realms.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn module_names(&self, realm: &str) -> Vec<String> {
        self.realms
            .read()
            .get(realm)
            .map(|entries| entries.iter().map(|e| e.module.name().to_string()).collect())
            .unwrap_or_default()
    }

    /// Run the realm's modules in order. On success the principals of every module that
    /// succeeded are added to `subject`; on failure `subject` is left as it was.
    pub fn login(&self, realm: &str, subject: &mut Subject, handler: &dyn ChallengeHandler) -> LoginResult<()> {
        // Snapshot so modules run without holding the registry lock.
        let entries: Vec<Arc<ModuleEntry>> = match self.realms.read().get(realm) {
            Some(entries) if !entries.is_empty() => entries.clone(),
            _ => return Err(LoginError::UnknownRealm(realm.to_string())),
        };

        let mut granted: Vec<Subject> = Vec::new();
        let mut mandatory_failure: Option<LoginError> = None;
        let mut last_failure: Option<LoginError> = None;

        for entry in entries.iter() {
            let mut scratch = Subject::new();
            match entry.module.login(&mut scratch, handler) {
                Ok(()) => {
                    debug!(target: "realm_auth::realm", realm = %realm, module = %entry.module.name(), "module succeeded");
                    granted.push(scratch);
                    if entry.flag == ControlFlag::Sufficient && mandatory_failure.is_none() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(target: "realm_auth::realm", realm = %realm, module = %entry.module.name(), code = e.code_str(), "module failed: {}", e);
                    if entry.flag.is_mandatory() {
                        let stop = entry.flag == ControlFlag::Requisite;
                        if mandatory_failure.is_none() { mandatory_failure = Some(e); }
                        if stop { break; }
                    } else if last_failure.is_none() || !matches!(e, LoginError::UnsupportedChallenge(_)) {
                        // Keep a refusal over a later unsupported-challenge failure.
                        last_failure = Some(e);
                    }
                }
            }
        }

        if let Some(e) = mandatory_failure {
            return Err(e);
        }
        if granted.is_empty() {
            return Err(last_failure.unwrap_or_else(|| LoginError::failed("login failed")));
        }
        for s in granted {
            subject.extend(s.principals().cloned());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Challenge, CredentialRequest, CredentialResponder, Principal, Secret};

    struct Fixed {
        name: &'static str,
        grant: Option<Vec<Principal>>,
    }

    impl LoginModule for Fixed {
        fn name(&self) -> &str { self.name }
        fn login(&self, subject: &mut Subject, _handler: &dyn ChallengeHandler) -> LoginResult<()> {
            match &self.grant {
                Some(ps) => { subject.extend(ps.iter().cloned()); Ok(()) }
                None => Err(LoginError::failed(format!("{} refused", self.name))),
            }
        }
    }

    fn ok(name: &'static str, role: &str) -> Arc<dyn LoginModule> {
        Arc::new(Fixed { name, grant: Some(vec![Principal::role(role)]) })
    }

    fn fail(name: &'static str) -> Arc<dyn LoginModule> { Arc::new(Fixed { name, grant: None }) }

    fn run(reg: &RealmRegistry, realm: &str) -> (LoginResult<()>, Subject) {
        let req = CredentialRequest::password("admin", Secret::from("admin"));
        let responder = CredentialResponder::new(&req);
        let mut subject = Subject::new();
        let r = reg.login(realm, &mut subject, &responder);
        (r, subject)
    }

    #[test]
    fn unknown_realm() {
        let reg = RealmRegistry::new();
        let (r, s) = run(&reg, "karaf");
        assert!(matches!(r, Err(LoginError::UnknownRealm(ref n)) if n == "karaf"));
        assert!(s.is_empty());
    }

    #[test]
    fn sufficient_success_short_circuits() {
        let reg = RealmRegistry::new();
        reg.register("karaf", ControlFlag::Sufficient, ok("props", "admin"));
        reg.register("karaf", ControlFlag::Sufficient, ok("keys", "viewer"));
        let (r, s) = run(&reg, "karaf");
        assert!(r.is_ok());
        assert_eq!(s.roles().collect::<Vec<_>>(), vec!["admin"]);
    }

    #[test]
    fn sufficient_failure_falls_through_and_reports_last_error() {
        let reg = RealmRegistry::new();
        reg.register("karaf", ControlFlag::Sufficient, fail("props"));
        reg.register("karaf", ControlFlag::Sufficient, ok("keys", "viewer"));
        let (r, s) = run(&reg, "karaf");
        assert!(r.is_ok());
        assert_eq!(s.roles().collect::<Vec<_>>(), vec!["viewer"]);

        let reg = RealmRegistry::new();
        reg.register("karaf", ControlFlag::Sufficient, fail("props"));
        reg.register("karaf", ControlFlag::Sufficient, fail("keys"));
        let (r, _) = run(&reg, "karaf");
        assert_eq!(r.unwrap_err().to_string(), "keys refused");
    }

    #[test]
    fn refusal_is_reported_over_unsupported_challenge() {
        struct WantsKey;
        impl LoginModule for WantsKey {
            fn name(&self) -> &str { "keys" }
            fn login(&self, _s: &mut Subject, h: &dyn ChallengeHandler) -> LoginResult<()> {
                let mut cs = [Challenge::name("login: "), Challenge::public_key()];
                h.handle(&mut cs)
            }
        }
        let reg = RealmRegistry::new();
        reg.register("karaf", ControlFlag::Sufficient, fail("props"));
        reg.register("karaf", ControlFlag::Sufficient, Arc::new(WantsKey));
        let (r, _) = run(&reg, "karaf");
        assert_eq!(r.unwrap_err().to_string(), "props refused");
    }

    #[test]
    fn required_failure_wins_and_leaves_subject_untouched() {
        let reg = RealmRegistry::new();
        reg.register("r", ControlFlag::Required, fail("audit"));
        reg.register("r", ControlFlag::Optional, ok("extra", "viewer"));
        let (r, s) = run(&reg, "r");
        assert_eq!(r.unwrap_err().to_string(), "audit refused");
        assert!(s.is_empty());
    }

    #[test]
    fn requisite_failure_stops_evaluation() {
        struct Panicky;
        impl LoginModule for Panicky {
            fn name(&self) -> &str { "never" }
            fn login(&self, _s: &mut Subject, _h: &dyn ChallengeHandler) -> LoginResult<()> {
                panic!("must not run after a requisite failure")
            }
        }
        let reg = RealmRegistry::new();
        reg.register("r", ControlFlag::Requisite, fail("gate"));
        reg.register("r", ControlFlag::Required, Arc::new(Panicky));
        let (r, _) = run(&reg, "r");
        assert_eq!(r.unwrap_err().to_string(), "gate refused");
    }

    #[test]
    fn required_modules_merge_principals() {
        let reg = RealmRegistry::new();
        reg.register("r", ControlFlag::Required, ok("a", "admin"));
        reg.register("r", ControlFlag::Required, ok("b", "viewer"));
        let (r, s) = run(&reg, "r");
        assert!(r.is_ok());
        assert_eq!(s.roles().collect::<Vec<_>>(), vec!["admin", "viewer"]);
    }

    #[test]
    fn challenge_errors_propagate_from_modules() {
        struct AsksOtp;
        impl LoginModule for AsksOtp {
            fn name(&self) -> &str { "otp" }
            fn login(&self, _s: &mut Subject, h: &dyn ChallengeHandler) -> LoginResult<()> {
                let mut cs = [Challenge::name("login: "), Challenge::otp("code: ")];
                h.handle(&mut cs)
            }
        }
        let reg = RealmRegistry::new();
        reg.register("r", ControlFlag::Required, Arc::new(AsksOtp));
        let (r, _) = run(&reg, "r");
        assert_eq!(r.unwrap_err().code_str(), "unsupported_challenge");
    }

    #[test]
    fn listing() {
        let reg = RealmRegistry::new();
        reg.register("karaf", ControlFlag::Sufficient, ok("props", "admin"));
        reg.register("alt", ControlFlag::Required, ok("x", "admin"));
        assert_eq!(reg.realms(), vec!["alt".to_string(), "karaf".to_string()]);
        assert_eq!(reg.module_names("karaf"), vec!["props".to_string()]);
        assert!(reg.unregister("alt"));
        assert!(!reg.unregister("alt"));
    }
}
