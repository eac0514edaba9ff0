//! Session and user identity.
//!
//! A session is one running editor instance. Its id is generated once per
//! process and never persisted, so two tabs of the same user are two
//! sessions with two cursor records.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Opaque id of one editor session.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

static PROCESS_SESSION: OnceLock<SessionId> = OnceLock::new();

impl SessionId {
    /// A fresh random id (UUID v4, simple form: safe as a store key).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// The id of this process, generated on first use.
    pub fn process() -> &'static SessionId {
        PROCESS_SESSION.get_or_init(Self::generate)
    }

    /// Wrap a key read back from the store.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRef(String);

impl UserRef {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserRef {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Display names of known users.
#[derive(Debug, Clone, Default)]
pub struct UserIndex {
    profiles: BTreeMap<UserRef, UserProfile>,
}

impl UserIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a `{ userRef: { name } }` mapping; malformed entries are
    /// skipped.
    pub fn from_value(value: &Value) -> Self {
        let mut index = Self::new();
        if let Some(map) = value.as_object() {
            for (user, profile) in map {
                match serde_json::from_value::<UserProfile>(profile.clone()) {
                    Ok(profile) => index.insert(UserRef::new(user.as_str()), profile),
                    Err(e) => log::debug!("Skipping profile for {user}: {e}"),
                }
            }
        }
        index
    }

    pub fn insert(&mut self, user: UserRef, profile: UserProfile) {
        self.profiles.insert(user, profile);
    }

    pub fn get(&self, user: &UserRef) -> Option<&UserProfile> {
        self.profiles.get(user)
    }

    /// Profile name when known, the raw reference otherwise.
    pub fn display_name(&self, user: &UserRef) -> String {
        self.profiles
            .get(user)
            .and_then(|p| p.name.clone())
            .unwrap_or_else(|| user.to_string())
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Who this session is acting as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub session: SessionId,
    pub user: Option<UserRef>,
}

impl Identity {
    /// Signed-out identity for the process session.
    pub fn anonymous() -> Self {
        Self::new(SessionId::process().clone())
    }

    pub fn new(session: SessionId) -> Self {
        Self { session, user: None }
    }

    pub fn sign_in(&mut self, user: UserRef) {
        log::info!("Session {} signed in as {user}", self.session);
        self.user = Some(user);
    }

    pub fn sign_out(&mut self) {
        if let Some(user) = self.user.take() {
            log::info!("Session {} signed out ({user})", self.session);
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }
}
