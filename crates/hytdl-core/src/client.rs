//! HTTP plumbing: authenticated JSON GETs and token-endpoint form POSTs.
//!
//! One curl easy handle per request. The metadata endpoints speak JSON; the
//! token endpoint takes form-encoded requests and answers in JSON. The
//! streaming download has its own transfer loop in [`crate::download`].

use curl::easy::{Easy, List};
use serde::de::DeserializeOwned;
use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::auth::{AuthError, RefreshingSession};

/// Raw response: numeric code, reason line (e.g. "404 Not Found"), body.
#[derive(Debug)]
pub struct HttpResponse {
    pub code: u32,
    pub status: String,
    pub body: Vec<u8>,
}

pub(crate) fn is_success(code: u32) -> bool {
    (200..300).contains(&code)
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP status: {status}")]
    Status { status: String, body: String },
    #[error("request failed: {0}")]
    Transport(#[from] curl::Error),
    #[error("malformed response body: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Shared authenticated transport. Every request asks the session for the
/// current token, so callers transparently ride rotations.
pub struct AuthClient {
    session: Arc<RefreshingSession>,
}

impl AuthClient {
    pub fn new(session: Arc<RefreshingSession>) -> Self {
        Self { session }
    }

    /// Authenticated GET returning a decoded JSON body.
    pub fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ClientError> {
        let token = self.session.token()?;
        decode(get(url, Some(&token.access_token))?)
    }

    /// `Authorization` header value for requests built elsewhere.
    pub(crate) fn auth_header(&self) -> Result<String, AuthError> {
        Ok(format!("Bearer {}", self.session.token()?.access_token))
    }
}

/// Unauthenticated GET returning a decoded JSON body (update endpoint).
pub(crate) fn fetch_json<T: DeserializeOwned>(url: &str) -> Result<T, ClientError> {
    decode(get(url, None)?)
}

fn decode<T: DeserializeOwned>(resp: HttpResponse) -> Result<T, ClientError> {
    if !is_success(resp.code) {
        return Err(ClientError::Status {
            status: resp.status,
            body: String::from_utf8_lossy(&resp.body).into_owned(),
        });
    }
    Ok(serde_json::from_slice(&resp.body)?)
}

pub(crate) fn get(url: &str, bearer: Option<&str>) -> Result<HttpResponse, curl::Error> {
    let mut easy = Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(Duration::from_secs(15))?;
    easy.timeout(Duration::from_secs(30))?;
    if let Some(token) = bearer {
        let mut list = List::new();
        list.append(&format!("Authorization: Bearer {}", token))?;
        easy.http_headers(list)?;
    }
    perform(&mut easy)
}

/// POST `application/x-www-form-urlencoded` fields. Returns the response for
/// any status; token-endpoint callers parse OAuth error bodies themselves.
pub(crate) fn post_form(
    url: &str,
    fields: &[(&str, &str)],
) -> Result<HttpResponse, curl::Error> {
    let mut easy = Easy::new();
    easy.url(url)?;
    easy.connect_timeout(Duration::from_secs(15))?;
    easy.timeout(Duration::from_secs(30))?;
    let body = encode_form(&mut easy, fields);
    easy.post(true)?;
    easy.post_fields_copy(body.as_bytes())?;
    perform(&mut easy)
}

/// Field names are fixed protocol identifiers; only values need escaping.
fn encode_form(easy: &mut Easy, fields: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (name, value) in fields {
        if !body.is_empty() {
            body.push('&');
        }
        body.push_str(name);
        body.push('=');
        body.push_str(&easy.url_encode(value.as_bytes()));
    }
    body
}

fn perform(easy: &mut Easy) -> Result<HttpResponse, curl::Error> {
    let status = RefCell::new(String::new());
    let body = RefCell::new(Vec::new());
    {
        let mut transfer = easy.transfer();
        transfer.header_function(|line| {
            if let Some(text) = parse_status_line(line) {
                *status.borrow_mut() = text;
            }
            true
        })?;
        transfer.write_function(|data| {
            body.borrow_mut().extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }
    let code = easy.response_code()?;
    Ok(HttpResponse {
        code,
        status: status.into_inner(),
        body: body.into_inner(),
    })
}

/// Extract "404 Not Found" from a raw "HTTP/1.1 404 Not Found" header line.
pub(crate) fn parse_status_line(line: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(line).ok()?.trim();
    let rest = text.strip_prefix("HTTP/")?;
    let (_, status) = rest.split_once(' ')?;
    Some(status.trim().to_string())
}
