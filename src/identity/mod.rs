//! Identity side of the bridge: credentials, challenges, realms, and the session slot the
//! verified subject ends up in. Keep the public surface thin and split implementation across
//! sub-modules.

mod principal;
mod credential;
mod challenge;
mod provider;
mod properties;
mod authorizer;
mod session;

pub use principal::{Principal, Subject};
pub use credential::{CredentialRequest, Proof, PublicKey, Secret};
pub use challenge::{Challenge, ChallengeHandler, ChallengeKind, CredentialResponder};
pub use provider::{ControlFlag, LoginModule, RealmRegistry};
pub use properties::{hash_password, register_default_realm, PropertiesLoginModule, PublickeyLoginModule, UserStore};
pub use authorizer::{has_role, role_count};
pub use session::{
    bind, bound_subject, AttributeKey, AttributeMap, AttributeValue, SessionAttributes, SessionAttributesExt,
    SUBJECT_ATTRIBUTE_KEY,
};
