//! Persisted session state.
//!
//! The session is three string entries in a [`KeyValueStore`]: `user`
//! (JSON profile), `token` (bearer token) and `isExternalAuth` (`"true"` or
//! `"false"`). [`CredentialStore`] keeps the in-memory copy and mirrors every
//! change to the backend.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};

/// Key holding the serialized user profile.
pub const USER_KEY: &str = "user";
/// Key holding the access token.
pub const TOKEN_KEY: &str = "token";
/// Key holding the auth-method flag.
pub const AUTH_METHOD_KEY: &str = "isExternalAuth";

/// String key/value persistence.
///
/// `set_many` and `remove_many` apply all of their entries in one write, so
/// a reader never sees half of a change.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value for `key`, if present.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores every entry in one write.
    fn set_many(&self, entries: &[(&str, String)]) -> ProviderResult<()>;

    /// Removes every key in one write. Missing keys are ignored.
    fn remove_many(&self, keys: &[&str]) -> ProviderResult<()>;
}

/// In-memory store. Clones share the same entries, which is how tests
/// simulate a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set_many(&self, entries: &[(&str, String)]) -> ProviderResult<()> {
        let mut map = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in entries {
            map.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> ProviderResult<()> {
        let mut map = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}

/// A JSON object on disk.
///
/// Every change rewrites the whole file through a temp file and a rename.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`.
    ///
    /// A missing or unreadable file opens as an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::read_entries(&path);
        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    fn read_entries(path: &Path) -> BTreeMap<String, String> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                debug!("no session file at {:?}: {}", path, e);
                return BTreeMap::new();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("ignoring unreadable session file {:?}: {}", path, e);
            BTreeMap::new()
        })
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, entries: &BTreeMap<String, String>) -> ProviderResult<()> {
        if entries.is_empty() {
            if self.path.exists() {
                fs::remove_file(&self.path).map_err(|e| {
                    ProviderError::storage(format!("failed to remove session file: {}", e))
                        .with_source(e)
                })?;
                info!("cleared session file {:?}", self.path);
            }
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ProviderError::storage(format!("failed to create session directory: {}", e))
                    .with_source(e)
            })?;
        }

        let content = serde_json::to_string_pretty(entries).map_err(|e| {
            ProviderError::storage(format!("failed to serialize session: {}", e)).with_source(e)
        })?;

        let temp_path = self.path.with_extension("json.tmp");
        write_private(&temp_path, content.as_bytes()).map_err(|e| {
            ProviderError::storage(format!("failed to write session file: {}", e)).with_source(e)
        })?;

        fs::rename(&temp_path, &self.path).map_err(|e| {
            ProviderError::storage(format!("failed to replace session file: {}", e))
                .with_source(e)
        })?;

        debug!("saved session to {:?}", self.path);
        Ok(())
    }
}

/// Writes `content` to a file only the owner can read, created with mode
/// 0600.
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    // mode only applies on creation; a stale temp file keeps its own
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(content)?;
    file.sync_all()
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set_many(&self, entries: &[(&str, String)]) -> ProviderResult<()> {
        let mut current = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = current.clone();
        for (key, value) in entries {
            next.insert((*key).to_string(), value.clone());
        }
        self.write(&next)?;
        *current = next;
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> ProviderResult<()> {
        let mut current = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = current.clone();
        for key in keys {
            next.remove(*key);
        }
        self.write(&next)?;
        *current = next;
        Ok(())
    }
}

/// How the session was established.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthMethod {
    /// Signed in through the external identity provider.
    Provider,
    /// Any other sign-in path.
    #[default]
    Other,
}

impl AuthMethod {
    fn as_flag(self) -> &'static str {
        match self {
            Self::Provider => "true",
            Self::Other => "false",
        }
    }

    fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some("true") => Self::Provider,
            _ => Self::Other,
        }
    }
}

/// The signed-in user's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Stable subject identifier.
    pub id: String,
    /// Display name.
    #[serde(rename = "name", default)]
    pub display_name: Option<String>,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Avatar image URL.
    #[serde(rename = "picture", default)]
    pub avatar_url: Option<String>,
}

/// Fields to overwrite in [`CredentialStore::update_user`].
///
/// `None` leaves the existing value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    /// New display name.
    pub display_name: Option<String>,
    /// New email address.
    pub email: Option<String>,
    /// New avatar URL.
    pub avatar_url: Option<String>,
}

impl UserPatch {
    fn apply(self, user: &mut UserProfile) {
        if let Some(name) = self.display_name {
            user.display_name = Some(name);
        }
        if let Some(email) = self.email {
            user.email = Some(email);
        }
        if let Some(avatar) = self.avatar_url {
            user.avatar_url = Some(avatar);
        }
    }
}

/// Snapshot of the current session.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// The signed-in user.
    pub user: Option<UserProfile>,
    /// The bearer token.
    pub access_token: Option<String>,
    /// How the session was established.
    pub auth_method: AuthMethod,
}

impl Session {
    /// True iff both a user and a token are present.
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.access_token.is_some()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("auth_method", &self.auth_method)
            .finish()
    }
}

/// The session, mirrored into a [`KeyValueStore`].
pub struct CredentialStore {
    backend: Box<dyn KeyValueStore>,
    session: RwLock<Session>,
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("session", &self.session())
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Opens the store and hydrates the session from `backend`.
    ///
    /// Hydration never fails: a corrupt `user` entry reads as no user, and a
    /// user without a token (or the reverse) reads as signed out.
    pub fn open(backend: impl KeyValueStore + 'static) -> Self {
        let session = Self::hydrate(&backend);
        Self {
            backend: Box::new(backend),
            session: RwLock::new(session),
        }
    }

    fn hydrate(backend: &dyn KeyValueStore) -> Session {
        let user = backend.get(USER_KEY).and_then(|raw| {
            serde_json::from_str::<Option<UserProfile>>(&raw)
                .map_err(|e| warn!("ignoring unreadable persisted user: {}", e))
                .ok()
                .flatten()
        });
        let access_token = backend.get(TOKEN_KEY).filter(|t| !t.is_empty());
        let auth_method = AuthMethod::from_flag(backend.get(AUTH_METHOD_KEY).as_deref());

        match (user, access_token) {
            (Some(user), Some(token)) => {
                debug!("restored session for user {}", user.id);
                Session {
                    user: Some(user),
                    access_token: Some(token),
                    auth_method,
                }
            }
            (None, None) => Session::default(),
            _ => {
                warn!("persisted session is incomplete, starting signed out");
                Session::default()
            }
        }
    }

    /// Returns a snapshot of the session.
    pub fn session(&self) -> Session {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// True iff both a user and a token are present.
    pub fn is_authenticated(&self) -> bool {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_authenticated()
    }

    /// Returns the stored access token, if any.
    pub fn access_token(&self) -> Option<String> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .access_token
            .clone()
    }

    /// Returns the stored user, if any.
    pub fn user(&self) -> Option<UserProfile> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .user
            .clone()
    }

    /// Replaces the session and persists all three fields in one write.
    ///
    /// On a storage failure the previous session stays in place.
    pub fn login(
        &self,
        user: UserProfile,
        access_token: impl Into<String>,
        auth_method: AuthMethod,
    ) -> ProviderResult<()> {
        let access_token = access_token.into();
        let user_json = serde_json::to_string(&user).map_err(|e| {
            ProviderError::storage(format!("failed to serialize user: {}", e)).with_source(e)
        })?;

        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        self.backend.set_many(&[
            (USER_KEY, user_json),
            (TOKEN_KEY, access_token.clone()),
            (AUTH_METHOD_KEY, auth_method.as_flag().to_string()),
        ])?;

        info!("signed in as {}", user.id);
        *session = Session {
            user: Some(user),
            access_token: Some(access_token),
            auth_method,
        };
        Ok(())
    }

    /// Clears the session and its persisted entries.
    ///
    /// The in-memory session is cleared even if removing the persisted
    /// entries fails; that failure is still returned.
    pub fn logout(&self) -> ProviderResult<()> {
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        *session = Session::default();
        self.backend
            .remove_many(&[USER_KEY, TOKEN_KEY, AUTH_METHOD_KEY])?;
        info!("signed out");
        Ok(())
    }

    /// Merges `patch` into the current user and persists only the user.
    ///
    /// Fails with an authentication error when nobody is signed in.
    pub fn update_user(&self, patch: UserPatch) -> ProviderResult<UserProfile> {
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        let mut user = session
            .user
            .clone()
            .ok_or_else(|| ProviderError::authentication("no signed-in user to update"))?;
        patch.apply(&mut user);

        let user_json = serde_json::to_string(&user).map_err(|e| {
            ProviderError::storage(format!("failed to serialize user: {}", e)).with_source(e)
        })?;
        self.backend.set_many(&[(USER_KEY, user_json)])?;

        session.user = Some(user.clone());
        Ok(user)
    }
}
