//! Release metadata: version manifests, signed download URLs, tool updates.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::client::{self, AuthClient, ClientError};
use crate::config::Endpoints;

/// Remote-declared version and digest for one patchline. Fetched once per
/// download operation, never mutated.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub sha256: String,
}

/// Latest released version of the hytdl tool itself.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateInfo {
    pub latest: String,
}

#[derive(Debug, Deserialize)]
struct SignedUrl {
    url: String,
}

/// Fetch the version manifest for a patchline.
pub fn fetch(client: &AuthClient, endpoints: &Endpoints, patchline: &str) -> Result<Manifest> {
    let url = format!("{}/version/{}.json", endpoints.distribution_base, patchline);
    client
        .get_json(&url)
        .with_context(|| format!("could not fetch the {:?} manifest", patchline))
}

/// Resolve the time-limited signed download URL for a patchline. Non-200
/// responses surface the raw body for diagnostics.
pub fn signed_url(client: &AuthClient, endpoints: &Endpoints, patchline: &str) -> Result<String> {
    let url = format!("{}/game-assets/{}", endpoints.account_data_base, patchline);
    match client.get_json::<SignedUrl>(&url) {
        Ok(signed) => Ok(signed.url),
        Err(ClientError::Status { status, body }) => {
            anyhow::bail!("HTTP status: {}\nResponse: {}", status, body)
        }
        Err(err) => {
            Err(err).with_context(|| format!("could not resolve the {:?} download URL", patchline))
        }
    }
}

/// Check whether a newer hytdl is available. Informational only.
pub fn check_for_updates(endpoints: &Endpoints) -> Result<UpdateInfo> {
    let url = format!("{}/version.json", endpoints.distribution_base);
    client::fetch_json(&url).context("could not check for updates")
}

/// Where to fetch the latest hytdl build.
pub fn downloader_url(endpoints: &Endpoints) -> String {
    format!("{}/hytale-downloader.zip", endpoints.distribution_base)
}
