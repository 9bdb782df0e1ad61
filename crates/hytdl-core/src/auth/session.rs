//! The self-refreshing session: token caching, refresh, and rotation
//! persistence.

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{flow, AuthError, OAuthConfig, SessionToken, Token};

/// Base token-acquisition mechanism. Every call yields a currently valid
/// provider token, which may be a cached value or a freshly refreshed one.
pub trait TokenSource: Send + Sync {
    fn token(&self) -> Result<Token, AuthError>;
}

/// [`TokenSource`] backed by the refresh grant. Hands out the cached token
/// while it is fresh; otherwise swaps in a refreshed one. A failed refresh
/// leaves the cached token untouched.
pub struct RefreshTokenSource {
    oauth: OAuthConfig,
    current: Mutex<Token>,
}

impl RefreshTokenSource {
    pub fn new(oauth: OAuthConfig, initial: Token) -> Self {
        Self {
            oauth,
            current: Mutex::new(initial),
        }
    }
}

impl TokenSource for RefreshTokenSource {
    fn token(&self) -> Result<Token, AuthError> {
        let mut current = lock(&self.current);
        if current.is_fresh() {
            return Ok(current.clone());
        }
        let refreshed = flow::refresh_grant(&self.oauth, &current.refresh_token)?;
        *current = refreshed.clone();
        Ok(refreshed)
    }
}

/// Invoked with the newly tagged token whenever the access credential
/// rotates, so the caller can persist it.
pub type RotationCallback = Box<dyn Fn(&SessionToken) + Send + Sync>;

/// Wraps a [`TokenSource`] and watches for rotation. Safe to share across
/// threads: the rotation check and the callback run under one guard, so a
/// rotation is reported exactly once no matter how many callers race.
pub struct RefreshingSession {
    source: Box<dyn TokenSource>,
    branch: String,
    last_access: Mutex<String>,
    on_rotation: RotationCallback,
}

impl RefreshingSession {
    /// `initial_access` seeds rotation detection: the token the session
    /// starts from has already been persisted and is not a rotation.
    pub fn new(
        source: Box<dyn TokenSource>,
        initial_access: String,
        branch: &str,
        on_rotation: RotationCallback,
    ) -> Self {
        Self {
            source,
            branch: branch.to_string(),
            last_access: Mutex::new(initial_access),
            on_rotation,
        }
    }

    /// Current provider token. On failure the last-seen credential is left
    /// unchanged and the callback does not fire.
    pub fn token(&self) -> Result<Token, AuthError> {
        let mut last_access = lock(&self.last_access);
        let token = self.source.token()?;
        if token.access_token != *last_access {
            *last_access = token.access_token.clone();
            (self.on_rotation)(&SessionToken::tag(token.clone(), &self.branch));
        }
        Ok(token)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
