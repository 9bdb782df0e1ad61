//! OAuth 2.0 Device Authorization Grant and refresh grant against the
//! authorization server.
//!
//! The interactive half (showing the verification URL, deciding when to give
//! up) belongs to the caller; this module only speaks the wire protocol.

use chrono::{Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::thread;
use std::time::{Duration, Instant};

use super::{AuthError, OAuthConfig, Token};
use crate::client::{self, HttpResponse};

const DEVICE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";
/// Poll interval when the server does not suggest one.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
/// Lifetime assumed for access tokens issued without `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Server response to a device-authorization request.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    /// Seconds until the device code expires.
    pub expires_in: u64,
    /// Suggested polling interval in seconds.
    #[serde(default)]
    pub interval: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OauthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Ask the authorization server for a device code and user instructions.
pub fn request_device_authorization(oauth: &OAuthConfig) -> Result<DeviceAuthorization, AuthError> {
    let resp = client::post_form(
        &oauth.device_auth_url,
        &[
            ("client_id", oauth.client_id.as_str()),
            ("scope", oauth.scope.as_str()),
        ],
    )?;
    if !client::is_success(resp.code) {
        return Err(error_from_response(resp));
    }
    Ok(serde_json::from_slice(&resp.body)?)
}

/// Poll the token endpoint until the user approves, declines, or the device
/// code expires. Blocks for the whole dance.
pub fn poll_device_token(
    oauth: &OAuthConfig,
    authorization: &DeviceAuthorization,
) -> Result<Token, AuthError> {
    let deadline = Instant::now() + Duration::from_secs(authorization.expires_in);
    let mut interval = Duration::from_secs(
        authorization
            .interval
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
    );

    loop {
        thread::sleep(interval);
        if Instant::now() >= deadline {
            return Err(AuthError::DeviceExpired);
        }

        let resp = client::post_form(
            &oauth.token_url,
            &[
                ("client_id", oauth.client_id.as_str()),
                ("grant_type", DEVICE_GRANT_TYPE),
                ("device_code", authorization.device_code.as_str()),
            ],
        )?;
        if client::is_success(resp.code) {
            let parsed: TokenResponse = serde_json::from_slice(&resp.body)?;
            return Ok(token_from_response(parsed, None));
        }

        match serde_json::from_slice::<OauthErrorBody>(&resp.body) {
            Ok(body) => match body.error.as_str() {
                "authorization_pending" => continue,
                "slow_down" => interval += Duration::from_secs(5),
                "access_denied" => return Err(AuthError::AccessDenied),
                "expired_token" => return Err(AuthError::DeviceExpired),
                _ => {
                    return Err(AuthError::Oauth {
                        code: body.error,
                        description: body.error_description,
                    })
                }
            },
            Err(_) => return Err(status_error(resp)),
        }
    }
}

/// Exchange the refresh credential for a new token. A response without a new
/// refresh credential keeps the old one.
pub fn refresh_grant(oauth: &OAuthConfig, refresh_token: &str) -> Result<Token, AuthError> {
    let resp = client::post_form(
        &oauth.token_url,
        &[
            ("client_id", oauth.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ],
    )?;
    if !client::is_success(resp.code) {
        return Err(error_from_response(resp));
    }
    let parsed: TokenResponse = serde_json::from_slice(&resp.body)?;
    Ok(token_from_response(parsed, Some(refresh_token)))
}

fn token_from_response(resp: TokenResponse, previous_refresh: Option<&str>) -> Token {
    let lifetime = resp.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
    Token {
        access_token: resp.access_token,
        refresh_token: resp
            .refresh_token
            .or_else(|| previous_refresh.map(str::to_owned))
            .unwrap_or_default(),
        expiry: Utc::now() + ChronoDuration::seconds(lifetime),
    }
}

/// Map a non-2xx token-endpoint response to the OAuth error it carries, or
/// to a plain status error when the body is not an OAuth error document.
fn error_from_response(resp: HttpResponse) -> AuthError {
    match serde_json::from_slice::<OauthErrorBody>(&resp.body) {
        Ok(body) => AuthError::Oauth {
            code: body.error,
            description: body.error_description,
        },
        Err(_) => status_error(resp),
    }
}

fn status_error(resp: HttpResponse) -> AuthError {
    AuthError::Status {
        status: resp.status,
        body: String::from_utf8_lossy(&resp.body).into_owned(),
    }
}
