//! Token value types: the provider-side token and its branch-tagged,
//! persistable form.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Tokens are treated as stale this many seconds before their recorded
/// expiry, so an in-flight request never rides a credential that dies
/// mid-transfer.
const EXPIRY_LEEWAY_SECS: i64 = 10;

/// Access/refresh credential pair as the authorization server hands it out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    pub expiry: DateTime<Utc>,
}

impl Token {
    /// True while the access credential can still be used.
    pub fn is_fresh(&self) -> bool {
        self.expiry - Duration::seconds(EXPIRY_LEEWAY_SECS) > Utc::now()
    }
}

/// Provider token plus the environment tag it was issued under. This is the
/// shape persisted by the credential store; a loaded token is only accepted
/// if its `branch` matches the running build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub access_token: String,
    pub refresh_token: String,
    pub expiry: DateTime<Utc>,
    pub branch: String,
}

impl SessionToken {
    /// Attach the environment tag to a provider token.
    pub fn tag(token: Token, branch: &str) -> Self {
        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expiry: token.expiry,
            branch: branch.to_string(),
        }
    }

    /// Strip the tag, back to the provider-side representation.
    pub fn into_token(self) -> Token {
        Token {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expiry: self.expiry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expiry: DateTime<Utc>) -> Token {
        Token {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expiry,
        }
    }

    #[test]
    fn token_with_future_expiry_is_fresh() {
        assert!(token(Utc::now() + Duration::hours(1)).is_fresh());
    }

    #[test]
    fn token_past_expiry_is_stale() {
        assert!(!token(Utc::now() - Duration::seconds(1)).is_fresh());
    }

    #[test]
    fn token_inside_leeway_window_is_stale() {
        assert!(!token(Utc::now() + Duration::seconds(EXPIRY_LEEWAY_SECS - 1)).is_fresh());
    }

    #[test]
    fn tag_and_untag_preserve_fields() {
        let expiry = Utc::now() + Duration::hours(1);
        let tagged = SessionToken::tag(token(expiry), "development");
        assert_eq!(tagged.branch, "development");
        let untagged = tagged.into_token();
        assert_eq!(untagged, token(expiry));
    }

    #[test]
    fn session_token_json_field_names() {
        let tagged = SessionToken::tag(token(Utc::now()), "release");
        let json = serde_json::to_string(&tagged).unwrap();
        for field in ["access_token", "refresh_token", "expiry", "branch"] {
            assert!(json.contains(field), "missing field {field} in {json}");
        }
    }
}
