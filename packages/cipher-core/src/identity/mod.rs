//! # Identity Module
//!
//! Registration, login, session lookup and logout. This is the only part of
//! the crate that talks to the user directory and the device store.
//!
//! ## Registration Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       REGISTRATION                                      │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  username taken? ──yes──► UsernameTaken                                 │
//! │       │ no                                                              │
//! │       ▼                                                                 │
//! │  KeyManager::generate() ──► RSA-2048 key pair                           │
//! │       │                                                                 │
//! │       ├──► public.export()  ──────────────────────┐                     │
//! │       │                                            ▼                    │
//! │       └──► private.export() ──► Vault::wrap(pw) ──► UserDirectory       │
//! │                                                    insert_user          │
//! │                                                        │                │
//! │                                                        ▼                │
//! │                                     Session (private key in memory)     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Login Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           LOGIN                                         │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  UserDirectory::find_user_by_username ──none──► UserNotFound            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Vault::unwrap(wrapped_private_key, pw) ──tag fails──► InvalidPassword  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PrivateKeyHandle::import ──► Session                                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Residency
//!
//! By default the unwrapped key only ever lives in this service's memory:
//! a restarted process finds the identity fields in the device store but
//! no key, so `current_session()` is `None` until the user logs in again.
//! [`KeyResidency::DeviceStore`] opts into keeping the exported key in the
//! device store as well.

mod session;

pub use session::Session;
pub(crate) use session::SessionIdentity;

use std::sync::Arc;

use parking_lot::RwLock;
use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};

use crate::config::{CoreConfig, KeyResidency};
use crate::crypto::{KeyManager, PrivateKeyHandle, Vault};
use crate::error::{Error, Result};
use crate::storage::{keys, DeviceStore, NewUser, UserDirectory};

/// Maximum length for display name
pub const MAX_DISPLAY_NAME_LENGTH: usize = 64;

/// Identity orchestration over the user directory and device store
pub struct IdentityService {
    residency: KeyResidency,
    vault: Vault,
    keys: KeyManager,
    users: Arc<dyn UserDirectory>,
    device: Arc<dyn DeviceStore>,
    /// The one active session on this device
    active: RwLock<Option<Session>>,
}

impl IdentityService {
    /// Create an identity service
    pub fn new(
        config: &CoreConfig,
        users: Arc<dyn UserDirectory>,
        device: Arc<dyn DeviceStore>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            residency: config.key_residency,
            vault: Vault::new(config.kdf),
            keys: config.key_manager()?,
            users,
            device,
            active: RwLock::new(None),
        })
    }

    /// Register a new user and start a session for them
    ///
    /// Key generation makes this slow; run it off any interactive thread.
    ///
    /// The directory record is written before the device store. If the
    /// device store then fails, the account exists and the error is
    /// returned; `login` with the same password completes the session.
    pub fn register(
        &self,
        username: &str,
        display_name: &str,
        password: &str,
    ) -> Result<Session> {
        self.register_with_rng(&mut OsRng, username, display_name, password)
    }

    /// Register drawing key, salt and nonce randomness from `rng`
    pub fn register_with_rng<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        username: &str,
        display_name: &str,
        password: &str,
    ) -> Result<Session> {
        validate_username(username)?;
        validate_password(password)?;
        let display_name = validate_display_name(username, display_name)?;

        if self.users.find_user_by_username(username)?.is_some() {
            tracing::info!(username, "Registration rejected: username taken");
            return Err(Error::UsernameTaken);
        }

        let pair = self.keys.generate_with_rng(rng)?;
        let public_key = pair.public().export()?;
        let private_text = pair.private().export()?;
        let wrapped = self
            .vault
            .wrap_with_rng(rng, private_text.as_bytes(), password)?;

        // The directory re-checks uniqueness; a concurrent registration
        // surfaces here as UsernameTaken
        let record = self.users.insert_user(NewUser {
            username: username.to_string(),
            display_name,
            public_key,
            wrapped_private_key: wrapped.to_text(),
        })?;

        let (_, private_key) = pair.into_parts();
        let session = self
            .establish(
                SessionIdentity {
                    id: record.id,
                    username: record.username,
                    display_name: record.display_name,
                },
                private_key,
            )
            .map_err(|e| {
                tracing::warn!(username, error = %e, "Account created but session not stored");
                e
            })?;

        tracing::info!(user_id = session.id(), username, "Registered new identity");
        Ok(session)
    }

    /// Log in with a password and start a session
    ///
    /// ## Errors
    ///
    /// - `UserNotFound` if the username is unknown
    /// - `InvalidPassword` if the stored key does not unwrap; no session is
    ///   created and any existing session is left untouched
    pub fn login(&self, username: &str, password: &str) -> Result<Session> {
        let record = self
            .users
            .find_user_by_username(username)?
            .ok_or(Error::UserNotFound)?;

        let secret = match self.vault.unwrap_text(&record.wrapped_private_key, password) {
            Ok(secret) => secret,
            Err(Error::WrongPasswordOrCorrupt) => {
                tracing::warn!(username, "Login failed: invalid password");
                return Err(Error::InvalidPassword);
            }
            Err(e) => return Err(e),
        };

        let private_text = std::str::from_utf8(&secret).map_err(|_| {
            Error::MalformedKeyMaterial("unwrapped private key is not text".into())
        })?;
        let private_key = PrivateKeyHandle::import(private_text)?;

        let session = self.establish(
            SessionIdentity {
                id: record.id,
                username: record.username,
                display_name: record.display_name,
            },
            private_key,
        )?;

        tracing::info!(user_id = session.id(), username, "Logged in");
        Ok(session)
    }

    /// The active session, if one can be reconstructed
    ///
    /// Needs both the identity fields in the device store and the private
    /// key (in memory, or in the device store under device residency).
    /// Never prompts for or derives anything from a password.
    pub fn current_session(&self) -> Result<Option<Session>> {
        let identity = match self.device.retrieve(keys::SESSION_IDENTITY)? {
            Some(bytes) => serde_json::from_slice::<SessionIdentity>(&bytes).map_err(|e| {
                Error::StorageReadError(format!("{}: {}", keys::SESSION_IDENTITY, e))
            })?,
            None => return Ok(None),
        };

        if let Some(session) = self.active.read().as_ref() {
            if session.id() == identity.id && session.is_active() {
                return Ok(Some(session.clone()));
            }
        }

        if self.residency != KeyResidency::DeviceStore {
            return Ok(None);
        }

        let key_bytes = match self.device.retrieve(keys::SESSION_PRIVATE_KEY)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        let key_text = std::str::from_utf8(&key_bytes).map_err(|_| {
            Error::StorageReadError(format!("{}: not text", keys::SESSION_PRIVATE_KEY))
        })?;
        let private_key = PrivateKeyHandle::import(key_text)?;

        let session = Session::new(identity, private_key);
        self.install(session.clone());

        tracing::debug!(user_id = session.id(), "Resumed session from device store");
        Ok(Some(session))
    }

    /// The active session, or `NoSession`
    pub fn require_session(&self) -> Result<Session> {
        self.current_session()?.ok_or(Error::NoSession)
    }

    /// Destroy all session state on this device
    ///
    /// The private key is dropped for every clone of the active session,
    /// including ones held by open inboxes. Idempotent. Device store
    /// failures are logged, never returned.
    pub fn logout(&self) {
        let previous = self.active.write().take();
        let revoked = previous.as_ref().is_some_and(Session::revoke);

        for key in [keys::SESSION_IDENTITY, keys::SESSION_PRIVATE_KEY] {
            if let Err(e) = self.device.delete(key) {
                tracing::warn!(key, error = %e, "Failed to clear device store entry on logout");
            }
        }

        match previous {
            Some(session) => tracing::info!(user_id = session.id(), revoked, "Logged out"),
            None => tracing::debug!("Logout with no active session"),
        }
    }

    /// Persist the identity and install a new active session
    fn establish(
        &self,
        identity: SessionIdentity,
        private_key: PrivateKeyHandle,
    ) -> Result<Session> {
        let identity_json = serde_json::to_vec(&identity)?;
        self.device.store(keys::SESSION_IDENTITY, &identity_json)?;

        match self.residency {
            KeyResidency::DeviceStore => {
                let exported = private_key.export()?;
                self.device
                    .store(keys::SESSION_PRIVATE_KEY, exported.as_bytes())?;
            }
            KeyResidency::SessionMemory => {
                // A key left behind by an earlier device-residency run must not linger
                self.device.delete(keys::SESSION_PRIVATE_KEY)?;
            }
        }

        let session = Session::new(identity, private_key);
        self.install(session.clone());
        Ok(session)
    }

    /// Make `session` the active one, revoking whichever it replaces
    fn install(&self, session: Session) {
        let previous = self.active.write().replace(session.clone());

        if let Some(previous) = previous {
            if !previous.same_slot(&session) && previous.revoke() {
                tracing::debug!(previous = previous.id(), "Revoked replaced session");
            }
        }
    }
}

fn validate_username(username: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(Error::InvalidInput("username must not be empty".into()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(Error::InvalidInput("password must not be empty".into()));
    }
    Ok(())
}

/// Empty display names fall back to the username
fn validate_display_name(username: &str, display_name: &str) -> Result<String> {
    let display_name = if display_name.trim().is_empty() {
        username
    } else {
        display_name
    };

    if display_name.chars().count() > MAX_DISPLAY_NAME_LENGTH {
        return Err(Error::InvalidInput(format!(
            "display name exceeds {} characters",
            MAX_DISPLAY_NAME_LENGTH
        )));
    }
    Ok(display_name.to_string())
}

// ============================================================================
// TESTS
// ============================================================================
