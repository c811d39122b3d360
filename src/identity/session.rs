//! Per-connection attribute storage and the binder that attaches a verified subject to it.

use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::principal::Subject;

pub type AttributeValue = Arc<dyn Any + Send + Sync>;

/// Typed, process-wide name for a session attribute.
pub struct AttributeKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> AttributeKey<T> {
    pub const fn new(name: &'static str) -> Self { Self { name, _marker: PhantomData } }

    pub fn name(&self) -> &'static str { self.name }
}

impl<T> Clone for AttributeKey<T> {
    fn clone(&self) -> Self { *self }
}

impl<T> Copy for AttributeKey<T> {}

impl<T> std::fmt::Debug for AttributeKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AttributeKey").field(&self.name).finish()
    }
}

/// Slot holding the subject of the last successful login on a session.
pub const SUBJECT_ATTRIBUTE_KEY: AttributeKey<Subject> = AttributeKey::new("realm_auth.subject");

/// What the transport's session object exposes to the bridge.
pub trait SessionAttributes: Send + Sync {
    /// Stores `value` under `name`, returning the value it replaced.
    fn set_raw(&self, name: &'static str, value: AttributeValue) -> Option<AttributeValue>;
    fn get_raw(&self, name: &'static str) -> Option<AttributeValue>;
    fn remove_raw(&self, name: &'static str) -> Option<AttributeValue>;
}

/// Typed access on top of [`SessionAttributes`]. Values stored under a key with a different
/// type read back as `None`.
pub trait SessionAttributesExt {
    fn set_attribute<T: Send + Sync + 'static>(&self, key: &AttributeKey<T>, value: T) -> Option<Arc<T>>;
    fn attribute<T: Send + Sync + 'static>(&self, key: &AttributeKey<T>) -> Option<Arc<T>>;
    fn remove_attribute<T: Send + Sync + 'static>(&self, key: &AttributeKey<T>) -> Option<Arc<T>>;
}

impl<S: SessionAttributes + ?Sized> SessionAttributesExt for S {
    fn set_attribute<T: Send + Sync + 'static>(&self, key: &AttributeKey<T>, value: T) -> Option<Arc<T>> {
        self.set_raw(key.name, Arc::new(value)).and_then(|old| old.downcast::<T>().ok())
    }

    fn attribute<T: Send + Sync + 'static>(&self, key: &AttributeKey<T>) -> Option<Arc<T>> {
        self.get_raw(key.name).and_then(|v| v.downcast::<T>().ok())
    }

    fn remove_attribute<T: Send + Sync + 'static>(&self, key: &AttributeKey<T>) -> Option<Arc<T>> {
        self.remove_raw(key.name).and_then(|v| v.downcast::<T>().ok())
    }
}

/// In-memory attribute store, usable directly as a session or embedded in one.
#[derive(Default)]
pub struct AttributeMap {
    inner: RwLock<HashMap<&'static str, AttributeValue>>,
}

impl AttributeMap {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.inner.read().len() }

    pub fn is_empty(&self) -> bool { self.inner.read().is_empty() }
}

impl SessionAttributes for AttributeMap {
    fn set_raw(&self, name: &'static str, value: AttributeValue) -> Option<AttributeValue> {
        self.inner.write().insert(name, value)
    }

    fn get_raw(&self, name: &'static str) -> Option<AttributeValue> {
        self.inner.read().get(name).cloned()
    }

    fn remove_raw(&self, name: &'static str) -> Option<AttributeValue> {
        self.inner.write().remove(name)
    }
}

/// Attach `subject` to the session. A subject from an earlier login on the same session is
/// replaced and returned.
pub fn bind(session: &dyn SessionAttributes, subject: Subject) -> Option<Arc<Subject>> {
    let user = subject.user_name().unwrap_or("<unnamed>").to_string();
    let previous = session.set_attribute(&SUBJECT_ATTRIBUTE_KEY, subject);
    debug!(target: "realm_auth::session", user = %user, rebound = previous.is_some(), "subject bound to session");
    previous
}

pub fn bound_subject(session: &dyn SessionAttributes) -> Option<Arc<Subject>> {
    session.attribute(&SUBJECT_ATTRIBUTE_KEY)
}
