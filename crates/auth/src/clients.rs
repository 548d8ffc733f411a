//! Refresh-token clients.
//!
//! A client pairs an opaque refresh token with the principal it was issued
//! to. Exchanging the token yields fresh access claims and rotates the token;
//! each token is honoured at most once.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use acs_core::PrincipalId;

use crate::{AccessClaims, AccessError, AuthConfig, AuthzError, IdentityStore, TokenValidationError};

/// Lifetime of the refresh token handed out at sign-in.
pub const REFRESH_TOKEN_TTL_MINUTES: i64 = 1440;

/// Lifetime of a token produced by rotation.
pub const ROTATED_REFRESH_TOKEN_TTL_MINUTES: i64 = 40;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshClient {
    pub principal_id: PrincipalId,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl RefreshClient {
    /// A client with a freshly generated token valid for `ttl` from `now`.
    pub fn issue(
        principal_id: PrincipalId,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self, TokenValidationError> {
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or(TokenValidationError::InvalidTimeWindow)?;
        Ok(Self {
            principal_id,
            refresh_token: generate_refresh_token(),
            expires_at,
        })
    }

    /// Expired strictly after `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// 256 random bits, hex encoded.
fn generate_refresh_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Storage for refresh clients, keyed by token.
pub trait ClientStore: Send + Sync {
    fn insert_client(&self, client: RefreshClient) -> Result<(), AuthzError>;

    fn find_client(&self, refresh_token: &str) -> Result<Option<RefreshClient>, AuthzError>;

    /// Atomically swap `refresh_token` for `replacement`.
    ///
    /// Returns the retired client, or `None` (and stores nothing) if the
    /// token was already gone.
    fn rotate_client(
        &self,
        refresh_token: &str,
        replacement: RefreshClient,
    ) -> Result<Option<RefreshClient>, AuthzError>;

    /// Drop every client expired at `now`; returns how many were removed.
    fn remove_expired_clients(&self, now: DateTime<Utc>) -> Result<usize, AuthzError>;
}

impl<C> ClientStore for Arc<C>
where
    C: ClientStore + ?Sized,
{
    fn insert_client(&self, client: RefreshClient) -> Result<(), AuthzError> {
        (**self).insert_client(client)
    }

    fn find_client(&self, refresh_token: &str) -> Result<Option<RefreshClient>, AuthzError> {
        (**self).find_client(refresh_token)
    }

    fn rotate_client(
        &self,
        refresh_token: &str,
        replacement: RefreshClient,
    ) -> Result<Option<RefreshClient>, AuthzError> {
        (**self).rotate_client(refresh_token, replacement)
    }

    fn remove_expired_clients(&self, now: DateTime<Utc>) -> Result<usize, AuthzError> {
        (**self).remove_expired_clients(now)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryClientStore {
    inner: RwLock<HashMap<String, RefreshClient>>,
}

impl InMemoryClientStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize, AuthzError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, AuthzError> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, RefreshClient>>, AuthzError> {
        self.inner
            .read()
            .map_err(|_| AuthzError::Storage("client store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, RefreshClient>>, AuthzError> {
        self.inner
            .write()
            .map_err(|_| AuthzError::Storage("client store lock poisoned".into()))
    }
}

impl ClientStore for InMemoryClientStore {
    fn insert_client(&self, client: RefreshClient) -> Result<(), AuthzError> {
        let mut clients = self.write()?;
        if clients.contains_key(&client.refresh_token) {
            return Err(AuthzError::Conflict("refresh token already issued".into()));
        }
        clients.insert(client.refresh_token.clone(), client);
        Ok(())
    }

    fn find_client(&self, refresh_token: &str) -> Result<Option<RefreshClient>, AuthzError> {
        Ok(self.read()?.get(refresh_token).cloned())
    }

    fn rotate_client(
        &self,
        refresh_token: &str,
        replacement: RefreshClient,
    ) -> Result<Option<RefreshClient>, AuthzError> {
        let mut clients = self.write()?;
        if clients.contains_key(&replacement.refresh_token) {
            return Err(AuthzError::Conflict("refresh token already issued".into()));
        }
        let Some(retired) = clients.remove(refresh_token) else {
            return Ok(None);
        };
        clients.insert(replacement.refresh_token.clone(), replacement);
        Ok(Some(retired))
    }

    fn remove_expired_clients(&self, now: DateTime<Utc>) -> Result<usize, AuthzError> {
        let mut clients = self.write()?;
        let before = clients.len();
        clients.retain(|_, client| !client.is_expired(now));
        Ok(before - clients.len())
    }
}

/// Access claims plus the refresh client that can renew them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub claims: AccessClaims,
    pub client: RefreshClient,
}

/// Issues sessions and exchanges refresh tokens for new ones.
#[derive(Debug, Clone)]
pub struct TokenIssuer<S, C> {
    identities: S,
    clients: C,
    config: AuthConfig,
}

impl<S: IdentityStore, C: ClientStore> TokenIssuer<S, C> {
    pub fn new(identities: S, clients: C, config: AuthConfig) -> Self {
        Self {
            identities,
            clients,
            config,
        }
    }

    pub fn clients(&self) -> &C {
        &self.clients
    }

    /// Open a session for an already authenticated principal.
    pub fn sign_in(&self, principal_id: &PrincipalId, now: DateTime<Utc>) -> Result<Session, AccessError> {
        let principal = self.identities.resolve_principal(principal_id)?;
        let claims = self
            .config
            .issue_claims(principal.principal_id, principal.role_id, now)?;
        let client = RefreshClient::issue(
            principal.principal_id,
            now,
            Duration::minutes(REFRESH_TOKEN_TTL_MINUTES),
        )?;
        self.clients.insert_client(client.clone())?;

        tracing::info!(principal_id = %principal.principal_id, login = %principal.login, "session opened");
        Ok(Session { claims, client })
    }

    /// Exchange `refresh_token` for new claims and a rotated token.
    ///
    /// Expired clients are purged first. An unknown, expired or already used
    /// token is `Unauthorized`; the principal's current role goes into the
    /// new claims.
    pub fn refresh(&self, refresh_token: &str, now: DateTime<Utc>) -> Result<Session, AccessError> {
        let purged = self.clients.remove_expired_clients(now)?;
        if purged > 0 {
            tracing::debug!(purged, "expired refresh clients removed");
        }

        let Some(current) = self.clients.find_client(refresh_token)? else {
            tracing::info!("refresh with unknown or expired token");
            return Err(AccessError::Unauthorized("unknown or expired refresh token".into()));
        };
        let principal = self.identities.resolve_principal(&current.principal_id)?;
        let claims = self
            .config
            .issue_claims(principal.principal_id, principal.role_id, now)?;
        let client = RefreshClient::issue(
            principal.principal_id,
            now,
            Duration::minutes(ROTATED_REFRESH_TOKEN_TTL_MINUTES),
        )?;

        if self.clients.rotate_client(refresh_token, client.clone())?.is_none() {
            tracing::info!(principal_id = %principal.principal_id, "refresh token used twice");
            return Err(AccessError::Unauthorized("refresh token already used".into()));
        }

        tracing::info!(principal_id = %principal.principal_id, "refresh token rotated");
        Ok(Session { claims, client })
    }
}
