//! Google sign-in and Google Calendar access.
//!
//! # Features
//!
//! - Implicit-grant sign-in through a loopback redirect
//! - Session persistence in a JSON file or in memory
//! - Lazy, shared loading of the identity client from the discovery document
//! - Calendar v3 listing, creation, replacement and deletion of events
//!
//! # Sign-in Flow
//!
//! 1. The client id is checked; a missing or placeholder id fails at once
//! 2. The identity client is loaded once from the discovery document
//! 3. The browser is sent to the consent page with `response_type=token`
//! 4. The token comes back through the loopback listener
//! 5. The user profile is fetched with the token
//! 6. User, token and auth method are persisted together
//!
//! # Example
//!
//! ```ignore
//! use calbridge_providers::google::{CalendarGateway, SessionConfig, SessionManager};
//!
//! let config = SessionConfig::new("1234-abc.apps.googleusercontent.com");
//! let manager = SessionManager::from_config(config.clone())?;
//!
//! if !manager.is_authenticated() {
//!     manager.sign_in().await?;
//! }
//!
//! let gateway = CalendarGateway::new(config.timeout)?;
//! if let Some(token) = manager.get_access_token() {
//!     gateway.set_access_token(token);
//! }
//! let events = gateway.list_today_events("primary").await?;
//! ```

mod bootstrap;
mod client;
mod config;
mod identity;
mod oauth;
mod session;
mod tokens;

pub use bootstrap::{ClientLoader, DiscoveryLoader, ProviderBootstrap};
pub use client::{CALENDAR_API_BASE, CalendarGateway, MAX_RESULTS};
pub use config::{
    CALENDAR_READ_SCOPE, CALENDAR_WRITE_SCOPE, GOOGLE_DISCOVERY_URL, SIGN_IN_SCOPES,
    SessionConfig,
};
pub use identity::{IdentityClient, IdentityEndpoints};
pub use oauth::{LoopbackTokenRequester, TokenRequest, TokenRequester, TokenResponse};
pub use session::{SessionManager, SessionState, SignedInSession};
pub use tokens::{
    AUTH_METHOD_KEY, AuthMethod, CredentialStore, FileStore, KeyValueStore, MemoryStore,
    Session, TOKEN_KEY, USER_KEY, UserPatch, UserProfile,
};
