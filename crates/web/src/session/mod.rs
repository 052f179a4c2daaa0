//! Cookie-identified, server-side sessions.
//!
//! [`SessionMiddleware`] looks up the session named by the request's session
//! cookie in a shared [`SessionStore`]. When there is none it creates one and
//! answers with a `Set-Cookie` carrying the new token. Either way the session is
//! attached to the request, where responders reach it through
//! [`RequestSessionExt::session`].
//!
//! A [`Session`] is shared, never copied: whatever one request stores is seen by
//! every later request presenting the same token.

mod config;
mod middleware;
mod store;

pub use config::{SessionConfig, SessionConfigBuilder};
pub use middleware::SessionMiddleware;
pub use store::{DEFAULT_SESSION_TTL, MemorySessionStore, SessionStore};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use keel_http::protocol::Request;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

const TOKEN_BYTES: usize = 32;

/// Key/value storage bound to one session token.
///
/// Values are JSON trees, so entries nest arbitrarily. All methods take `&self`;
/// the storage sits behind a mutex and the session is shared between requests.
#[derive(Debug)]
pub struct Session {
    token: String,
    storage: Mutex<Map<String, Value>>,
}

impl Session {
    pub fn new<T: Into<String>>(token: T) -> Self {
        Self { token: token.into(), storage: Mutex::new(Map::new()) }
    }

    /// A session under a fresh random token
    pub fn generate() -> Self {
        Self::new(generate_token())
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    /// Reads `key` as `T`; `None` when missing or of another shape
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|value| serde_json::from_value(value).ok())
    }

    /// Stores `value` under `key`, returning the value it replaced
    pub fn insert<K: Into<String>, V: Into<Value>>(&self, key: K, value: V) -> Option<Value> {
        self.lock().insert(key.into(), value.into())
    }

    pub fn insert_as<K: Into<String>, T: Serialize>(&self, key: K, value: &T) -> serde_json::Result<Option<Value>> {
        let value = serde_json::to_value(value)?;
        Ok(self.insert(key, value))
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.lock().remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Runs `f` with exclusive access to the whole storage tree.
    ///
    /// Use this for read-modify-write updates and nested mutation; `f` must not
    /// call back into the same session.
    pub fn with_storage<T, F: FnOnce(&mut Map<String, Value>) -> T>(&self, f: F) -> T {
        f(&mut self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Map<String, Value>> {
        self.storage.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 32 bytes from the OS random source, URL-safe base64 without padding
pub(crate) fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Access to the session [`SessionMiddleware`] attached to a request
pub trait RequestSessionExt {
    fn session(&self) -> Option<&Arc<Session>>;
}

impl RequestSessionExt for Request {
    fn session(&self) -> Option<&Arc<Session>> {
        self.extensions().get::<Arc<Session>>()
    }
}
