//! Credential file persistence.
//!
//! One JSON document per file: `{ access_token, refresh_token, expiry,
//! branch }`. Written with owner-only permissions; a loaded token is
//! rejected when its branch tag does not match the running build, with a
//! distinct error so the caller can fall back to a fresh sign-in.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::SessionToken;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("could not read credentials file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("credentials file {} is malformed: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(
        "credentials were created for the {found:?} environment, \
         but the current environment is {expected:?}"
    )]
    BranchMismatch { found: String, expected: String },
    #[error("could not write credentials file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not serialize credentials: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Load a session token, verifying its environment tag against `branch`.
pub fn load(path: &Path, branch: &str) -> Result<SessionToken, CredentialError> {
    let data = fs::read(path).map_err(|source| CredentialError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let token: SessionToken =
        serde_json::from_slice(&data).map_err(|source| CredentialError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
    if token.branch != branch {
        return Err(CredentialError::BranchMismatch {
            found: token.branch,
            expected: branch.to_string(),
        });
    }
    Ok(token)
}

/// Persist a session token, replacing any previous file contents in one
/// write. The file is created with mode 0600 on Unix.
pub fn save(path: &Path, token: &SessionToken) -> Result<(), CredentialError> {
    let data = serde_json::to_vec_pretty(token).map_err(CredentialError::Serialize)?;
    write_private(path, &data).map_err(|source| CredentialError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(unix)]
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(data)
}

#[cfg(not(unix))]
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    fs::write(path, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, SubsecRound, Utc};

    fn session_token(branch: &str) -> SessionToken {
        SessionToken {
            access_token: "access-1".to_string(),
            refresh_token: "refresh-1".to_string(),
            // Truncate so the RFC 3339 round-trip compares exactly.
            expiry: (Utc::now() + Duration::hours(1)).trunc_subsecs(0),
            branch: branch.to_string(),
        }
    }

    #[test]
    fn save_then_load_returns_equivalent_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let token = session_token("development");
        save(&path, &token).unwrap();
        let loaded = load(&path, "development").unwrap();
        assert_eq!(loaded, token);
    }

    #[test]
    fn load_rejects_foreign_branch_with_distinct_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        save(&path, &session_token("release")).unwrap();
        match load(&path, "development") {
            Err(CredentialError::BranchMismatch { found, expected }) => {
                assert_eq!(found, "release");
                assert_eq!(expected, "development");
            }
            other => panic!("expected BranchMismatch, got {other:?}"),
        }
    }

    #[test]
    fn load_missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json");
        assert!(matches!(
            load(&path, "development"),
            Err(CredentialError::Read { .. })
        ));
    }

    #[test]
    fn load_malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, b"not json {").unwrap();
        assert!(matches!(
            load(&path, "development"),
            Err(CredentialError::Malformed { .. })
        ));
    }

    #[test]
    fn save_overwrites_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let mut token = session_token("development");
        save(&path, &token).unwrap();
        token.access_token = "access-2".to_string();
        save(&path, &token).unwrap();
        let loaded = load(&path, "development").unwrap();
        assert_eq!(loaded.access_token, "access-2");
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        save(&path, &session_token("development")).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
