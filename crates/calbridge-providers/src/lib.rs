//! Google session lifecycle, Calendar v3 gateway and event normalization.
//!
//! # Architecture
//!
//! ```text
//!   SessionManager ──owns──▶ CredentialStore ──▶ KeyValueStore (file / memory)
//!        │
//!        ├─ ProviderBootstrap::ensure_loaded() ──▶ Arc<IdentityClient>
//!        └─ TokenRequester::request_token()    ──▶ TokenResponse
//!
//!   CalendarGateway (token copy set by the caller)
//!        │  list / create / update / delete
//!        ▼
//!   RemoteEvent ──normalize_event()──▶ DisplayEvent
//! ```
//!
//! # Example
//!
//! ```ignore
//! use calbridge_providers::google::{CalendarGateway, SessionManager};
//! use calbridge_providers::normalize_events;
//!
//! let signed_in = manager.sign_in().await?;
//! let gateway = CalendarGateway::new(timeout)?;
//! gateway.set_access_token(signed_in.access_token);
//! let events = normalize_events(&gateway.list_today_events("primary").await?);
//! ```

use std::future::Future;
use std::pin::Pin;

pub mod error;
#[cfg(feature = "google")]
pub mod google;
pub mod normalize;
pub mod raw_event;

pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use normalize::{event_color, normalize_event, normalize_events};
pub use raw_event::{CalendarRef, EventDateTime, EventDraft, EventPatch, RemoteEvent};

/// A boxed future for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
