//! Build identity, endpoint selection, and the user config file.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Environment this binary was built for. Injected at build time; anything
/// other than "release" selects the development backends.
pub const BRANCH: &str = match option_env!("HYTDL_BRANCH") {
    Some(branch) => branch,
    None => "development",
};

/// Version of the hytdl tool itself, for the update check. "dev" builds
/// skip the check entirely.
pub const BUILD_VERSION: &str = match option_env!("HYTDL_BUILD_VERSION") {
    Some(version) => version,
    None => "dev",
};

/// Backend base URLs for one environment. Constructed once at startup and
/// passed by reference into the auth and metadata code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// OAuth authorization server (device auth + token endpoints).
    pub oauth_base: String,
    /// Distribution server (version manifests, tool updates).
    pub distribution_base: String,
    /// Account-data server (signed download URLs).
    pub account_data_base: String,
}

impl Endpoints {
    /// Endpoint set for the given branch; "release" means production.
    pub fn for_branch(branch: &str) -> Self {
        if branch == "release" {
            Self {
                oauth_base: "https://oauth.accounts.hytale.com".to_string(),
                distribution_base: "https://downloader.hytale.com".to_string(),
                account_data_base: "https://account-data.hytale.com".to_string(),
            }
        } else {
            Self {
                oauth_base: "https://oauth.accounts-dev.hytale.com".to_string(),
                distribution_base: "https://downloader-dev.hytale.com".to_string(),
                account_data_base: "https://account-data-dev.hytale.com".to_string(),
            }
        }
    }
}

fn default_patchline() -> String {
    "release".to_string()
}

/// User configuration loaded from `~/.config/hytdl/config.toml`.
/// CLI flags override any of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HytdlConfig {
    /// Patchline downloaded when no `--patchline` flag is given.
    #[serde(default = "default_patchline")]
    pub patchline: String,
    /// Directory the default archive name is placed in (None = cwd).
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Credentials file location (None = `.hytale-downloader-credentials.json`).
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,
    /// Never check for hytdl updates on startup.
    #[serde(default)]
    pub skip_update_check: bool,
}

impl Default for HytdlConfig {
    fn default() -> Self {
        Self {
            patchline: default_patchline(),
            download_dir: None,
            credentials_path: None,
            skip_update_check: false,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("hytdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<HytdlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = HytdlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: HytdlConfig = toml::from_str(&data)?;
    Ok(cfg)
}
