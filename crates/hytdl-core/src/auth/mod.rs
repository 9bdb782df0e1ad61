//! Device-authorization sign-in and the self-refreshing session.

pub mod flow;
pub mod session;
pub mod store;
pub mod token;

pub use flow::DeviceAuthorization;
pub use session::{RefreshTokenSource, RefreshingSession, TokenSource};
pub use store::CredentialError;
pub use token::{SessionToken, Token};

use crate::config::Endpoints;
use std::fmt;

/// OAuth client identifier presented to the authorization server.
pub const CLIENT_ID: &str = "hytale-downloader";
/// Scopes requested during sign-in. `offline_access` yields the refresh
/// credential the session depends on.
pub const SCOPE: &str = "openid offline_access";

/// Immutable OAuth endpoint set. Built once per process from [`Endpoints`]
/// and passed by reference into the flow functions and the token source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub client_id: String,
    pub scope: String,
    pub device_auth_url: String,
    pub token_url: String,
}

impl OAuthConfig {
    pub fn new(endpoints: &Endpoints) -> Self {
        Self {
            client_id: CLIENT_ID.to_string(),
            scope: SCOPE.to_string(),
            device_auth_url: format!("{}/oauth2/device/auth", endpoints.oauth_base),
            token_url: format!("{}/oauth2/token", endpoints.oauth_base),
        }
    }
}

/// Error from token acquisition (device flow or refresh grant).
#[derive(Debug)]
pub enum AuthError {
    /// The request to the authorization server did not complete.
    Transport(curl::Error),
    /// Non-2xx response that did not carry a recognizable OAuth error body.
    Status { status: String, body: String },
    /// OAuth error response from the server (e.g. `invalid_grant`).
    Oauth {
        code: String,
        description: Option<String>,
    },
    /// Response body was not the expected JSON shape.
    Malformed(serde_json::Error),
    /// The device code expired before the user approved it.
    DeviceExpired,
    /// The user declined the authorization request.
    AccessDenied,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Transport(e) => write!(f, "token request failed: {}", e),
            AuthError::Status { status, body } => {
                write!(f, "token endpoint returned HTTP status {}", status)?;
                if !body.is_empty() {
                    write!(f, "\nResponse: {}", body)?;
                }
                Ok(())
            }
            AuthError::Oauth { code, description } => {
                write!(f, "authorization server error: {}", code)?;
                if let Some(description) = description {
                    write!(f, ": {}", description)?;
                }
                Ok(())
            }
            AuthError::Malformed(e) => write!(f, "malformed token response: {}", e),
            AuthError::DeviceExpired => {
                write!(f, "device authorization expired before it was approved")
            }
            AuthError::AccessDenied => write!(f, "authorization request was denied"),
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuthError::Transport(e) => Some(e),
            AuthError::Malformed(e) => Some(e),
            AuthError::Status { .. }
            | AuthError::Oauth { .. }
            | AuthError::DeviceExpired
            | AuthError::AccessDenied => None,
        }
    }
}

impl From<curl::Error> for AuthError {
    fn from(e: curl::Error) -> Self {
        AuthError::Transport(e)
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(e: serde_json::Error) -> Self {
        AuthError::Malformed(e)
    }
}
