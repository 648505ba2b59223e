//! Session lifecycle: sign-in, sign-out and the state machine between them.
//!
//! ```text
//!   SignedOut ──sign_in──▶ Initializing ──▶ Authenticating ──▶ SignedIn
//!       ▲                        │                 │               │
//!       └────── failure / drop ──┴─────────────────┘      sign_out ┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};

use super::bootstrap::{DiscoveryLoader, ProviderBootstrap};
use super::config::SessionConfig;
use super::identity::IdentityClient;
use super::oauth::{LoopbackTokenRequester, TokenRequest, TokenRequester};
use super::tokens::{AuthMethod, CredentialStore, FileStore, Session, UserPatch, UserProfile};

/// Where the session manager is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session.
    SignedOut,
    /// Loading the identity client.
    Initializing,
    /// Waiting for the user to finish the consent flow.
    Authenticating,
    /// A user and token are stored.
    SignedIn,
}

impl SessionState {
    /// Returns a stable snake_case name for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignedOut => "signed_out",
            Self::Initializing => "initializing",
            Self::Authenticating => "authenticating",
            Self::SignedIn => "signed_in",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful sign-in.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedInSession {
    /// The signed-in user.
    pub user: UserProfile,
    /// The bearer token.
    pub access_token: String,
}

impl std::fmt::Debug for SignedInSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedInSession")
            .field("user", &self.user)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Owns the credential store and is the only path that obtains, exchanges
/// or revokes tokens.
pub struct SessionManager {
    config: SessionConfig,
    store: CredentialStore,
    bootstrap: ProviderBootstrap,
    requester: Box<dyn TokenRequester>,
    state: Mutex<SessionState>,
    sign_in_pending: AtomicBool,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state())
            .field("store", &self.store)
            .field("bootstrap", &self.bootstrap)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Creates a manager from its parts.
    ///
    /// Starts `SignedIn` if the store already holds a complete session.
    pub fn new(
        config: SessionConfig,
        store: CredentialStore,
        bootstrap: ProviderBootstrap,
        requester: impl TokenRequester + 'static,
    ) -> Self {
        let state = if store.is_authenticated() {
            SessionState::SignedIn
        } else {
            SessionState::SignedOut
        };
        debug!("session manager starting {}", state);

        Self {
            config,
            store,
            bootstrap,
            requester: Box::new(requester),
            state: Mutex::new(state),
            sign_in_pending: AtomicBool::new(false),
        }
    }

    /// Creates a manager with the file store, discovery loader and loopback
    /// requester described by `config`.
    pub fn from_config(config: SessionConfig) -> ProviderResult<Self> {
        let store = CredentialStore::open(FileStore::open(&config.session_path));
        let bootstrap =
            ProviderBootstrap::new(DiscoveryLoader::from_config(&config)?, config.load_timeout);
        let requester = LoopbackTokenRequester::from_config(&config);
        Ok(Self::new(config, store, bootstrap, requester))
    }

    /// Returns the current state.
    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a snapshot of the session.
    pub fn session(&self) -> Session {
        self.store.session()
    }

    /// True iff a user and token are stored.
    pub fn is_authenticated(&self) -> bool {
        self.store.is_authenticated()
    }

    /// Returns the stored token without checking it.
    pub fn get_access_token(&self) -> Option<String> {
        self.store.access_token()
    }

    /// Merges `patch` into the stored user.
    pub fn update_user(&self, patch: UserPatch) -> ProviderResult<UserProfile> {
        self.store.update_user(patch)
    }

    /// Checks the client id and loads the identity client.
    ///
    /// The client id is checked before any network activity. Once the
    /// client is loaded this returns immediately.
    pub async fn initialize(&self) -> ProviderResult<Arc<IdentityClient>> {
        self.config.client_id()?;
        if self.bootstrap.is_ready() {
            return self.bootstrap.ensure_loaded().await;
        }

        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state == SessionState::SignedOut {
                *state = SessionState::Initializing;
            }
        }
        let _settle = Settle {
            manager: self,
            releases_sign_in: false,
        };
        self.bootstrap.ensure_loaded().await
    }

    /// Runs the consent flow, fetches the profile and stores the session.
    ///
    /// Fails with an invalid-state error if another sign-in is in flight.
    /// On failure, or if the returned future is dropped, the manager settles
    /// back to its previous resting state.
    pub async fn sign_in(&self) -> ProviderResult<SignedInSession> {
        let client_id = self.config.client_id()?.to_string();

        if self
            .sign_in_pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ProviderError::invalid_state("a sign-in is already in progress"));
        }
        let _settle = Settle {
            manager: self,
            releases_sign_in: true,
        };

        self.set_state(SessionState::Initializing);
        let client = self.bootstrap.ensure_loaded().await?;

        self.set_state(SessionState::Authenticating);
        let request = TokenRequest {
            client_id,
            scopes: self.config.scopes(),
        };
        let access_token = self
            .requester
            .request_token(&client, &request)
            .await?
            .into_access_token()?;

        let user = client.fetch_user_info(&access_token).await?;
        self.store
            .login(user.clone(), access_token.clone(), AuthMethod::Provider)?;

        info!("sign-in complete");
        Ok(SignedInSession { user, access_token })
    }

    /// Revokes `access_token` at the provider.
    ///
    /// Failures are logged and otherwise ignored.
    pub async fn revoke(&self, access_token: &str) {
        let client = match self.initialize().await {
            Ok(client) => client,
            Err(e) => {
                warn!("skipping token revocation: {}", e);
                return;
            }
        };
        if let Err(e) = client.revoke(access_token).await {
            warn!("token revocation failed: {}", e);
        }
    }

    /// Revokes the stored token, then clears the session.
    ///
    /// The session is cleared even when revocation fails. A storage failure
    /// while clearing is returned after the in-memory session is gone.
    pub async fn sign_out(&self) -> ProviderResult<()> {
        if let Some(token) = self.store.access_token() {
            self.revoke(&token).await;
        }
        let result = self.store.logout();
        self.settle();
        result
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        debug!("session state {} -> {}", *state, next);
        *state = next;
    }

    /// Returns to the resting state implied by the store, unless a sign-in
    /// still owns the state.
    fn settle(&self) {
        if self.sign_in_pending.load(Ordering::SeqCst) {
            return;
        }
        let next = if self.store.is_authenticated() {
            SessionState::SignedIn
        } else {
            SessionState::SignedOut
        };
        self.set_state(next);
    }
}

/// Settles the state machine when an operation ends, however it ends.
struct Settle<'a> {
    manager: &'a SessionManager,
    releases_sign_in: bool,
}

impl Drop for Settle<'_> {
    fn drop(&mut self) {
        if self.releases_sign_in {
            self.manager.sign_in_pending.store(false, Ordering::SeqCst);
        }
        self.manager.settle();
    }
}
