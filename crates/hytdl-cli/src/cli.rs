//! Flag surface and orchestration for the hytdl binary.
//!
//! Components below return errors; only this layer decides process exit.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hytdl_core::auth::{
    flow, store, OAuthConfig, RefreshTokenSource, RefreshingSession, SessionToken,
};
use hytdl_core::checksum::{self, ChecksumMismatch};
use hytdl_core::client::AuthClient;
use hytdl_core::config::{self, Endpoints, BRANCH, BUILD_VERSION};
use hytdl_core::download;
use hytdl_core::manifest;

use crate::progress::Renderer;

const DEFAULT_CREDENTIALS_FILE: &str = ".hytale-downloader-credentials.json";

/// Authenticated downloader for Hytale game builds.
#[derive(Debug, Parser)]
#[command(name = "hytdl")]
#[command(about = "Downloads and verifies Hytale game builds", long_about = None)]
pub struct Cli {
    /// Print the available game version for the patchline and exit.
    #[arg(long)]
    pub print_version: bool,

    /// Print the hytdl build version and exit.
    #[arg(long)]
    pub version: bool,

    /// Check for hytdl updates and exit.
    #[arg(long)]
    pub check_update: bool,

    /// Skip checking for hytdl updates.
    #[arg(long)]
    pub skip_update_check: bool,

    /// Path to download the build archive to.
    #[arg(long, value_name = "PATH")]
    pub download_path: Option<PathBuf>,

    /// Patchline to download from (default from config, then "release").
    #[arg(long, value_name = "NAME")]
    pub patchline: Option<String>,

    /// Path to the credentials file.
    #[arg(long, value_name = "PATH")]
    pub credentials_path: Option<PathBuf>,
}

pub fn run_from_args() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("{}", BUILD_VERSION);
        return Ok(());
    }

    let cfg = config::load_or_init()?;
    tracing::debug!("loaded config: {:?}", cfg);
    let endpoints = Endpoints::for_branch(BRANCH);

    if cli.check_update {
        check_for_updates(&endpoints);
        return Ok(());
    }
    if !cli.skip_update_check && !cfg.skip_update_check {
        check_for_updates(&endpoints);
    }

    let patchline = cli.patchline.unwrap_or_else(|| cfg.patchline.clone());
    let credentials_path = cli
        .credentials_path
        .or_else(|| cfg.credentials_path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_FILE));

    let oauth = OAuthConfig::new(&endpoints);
    let session_token = obtain_session(&oauth, &credentials_path)?;
    let session = build_session(oauth, session_token, &credentials_path);
    let client = AuthClient::new(session);

    if cli.print_version {
        let manifest = manifest::fetch(&client, &endpoints, &patchline)?;
        println!("{}", manifest.version);
        return Ok(());
    }

    run_download(
        &client,
        &endpoints,
        &patchline,
        cli.download_path,
        cfg.download_dir.as_deref(),
    )
}

/// Load stored credentials, falling back to a fresh device sign-in when the
/// file is absent, malformed, or tagged for another environment.
fn obtain_session(oauth: &OAuthConfig, credentials_path: &Path) -> Result<SessionToken> {
    match store::load(credentials_path, BRANCH) {
        Ok(token) => Ok(token),
        Err(err) => {
            tracing::info!("stored credentials unusable ({err}); starting device sign-in");
            sign_in(oauth, credentials_path)
        }
    }
}

fn sign_in(oauth: &OAuthConfig, credentials_path: &Path) -> Result<SessionToken> {
    let authorization =
        flow::request_device_authorization(oauth).context("error requesting device code")?;

    println!(
        "Please visit the following URL to authenticate:\n{}\n",
        authorization.verification_uri
    );
    if let Some(complete) = &authorization.verification_uri_complete {
        println!("Or visit the following URL and enter the code:\n{}\n", complete);
    }
    println!("Authorization code: {}\n", authorization.user_code);

    let token = flow::poll_device_token(oauth, &authorization).context("error obtaining token")?;
    let session_token = SessionToken::tag(token, BRANCH);
    store::save(credentials_path, &session_token).context("error saving session")?;
    Ok(session_token)
}

/// The session persists every observed rotation back to the credentials
/// file; a failed save is logged, not fatal.
fn build_session(
    oauth: OAuthConfig,
    session_token: SessionToken,
    credentials_path: &Path,
) -> Arc<RefreshingSession> {
    let save_path = credentials_path.to_path_buf();
    let initial_access = session_token.access_token.clone();
    let source = RefreshTokenSource::new(oauth, session_token.into_token());
    Arc::new(RefreshingSession::new(
        Box::new(source),
        initial_access,
        BRANCH,
        Box::new(move |rotated| {
            if let Err(err) = store::save(&save_path, rotated) {
                tracing::warn!("error saving refreshed session: {err}");
            }
        }),
    ))
}

fn check_for_updates(endpoints: &Endpoints) {
    // Dev builds have no release to compare against.
    if BUILD_VERSION == "dev" {
        println!("skipping update check for dev build");
        return;
    }
    match manifest::check_for_updates(endpoints) {
        Ok(info) if info.latest != BUILD_VERSION => {
            println!(
                "A new version of hytdl is available: {} (current: {})",
                info.latest, BUILD_VERSION
            );
            println!("Download it from: {}", manifest::downloader_url(endpoints));
        }
        Ok(_) => {}
        Err(err) => println!("warning: failed to check for updates: {:#}", err),
    }
}

fn run_download(
    client: &AuthClient,
    endpoints: &Endpoints,
    patchline: &str,
    path_override: Option<PathBuf>,
    download_dir: Option<&Path>,
) -> Result<()> {
    let manifest = manifest::fetch(client, endpoints, patchline).context("error getting version")?;
    let url =
        manifest::signed_url(client, endpoints, patchline).context("error getting download URL")?;

    let dest = destination_path(path_override, download_dir, patchline, &manifest.version);
    let dest = std::path::absolute(&dest)
        .with_context(|| format!("error resolving path {}", dest.display()))?;

    println!("downloading latest ({:?} patchline) to {:?}", patchline, dest);

    let mut renderer = Renderer::new();
    download::download(client, &url, &dest, &mut |event| renderer.render(event))
        .context("error downloading")?;

    println!("validating checksum...");
    if let Err(err) = checksum::verify(&dest, &manifest.sha256) {
        if err.is::<ChecksumMismatch>() {
            // A corrupt artifact must never be mistaken for a valid one on
            // a later run.
            if let Err(remove_err) = fs::remove_file(&dest) {
                tracing::warn!(
                    "could not remove corrupt artifact {}: {}",
                    dest.display(),
                    remove_err
                );
            }
        }
        return Err(err);
    }

    println!(
        "successfully downloaded {:?} patchline (version {})",
        patchline, manifest.version
    );
    Ok(())
}

/// Default name is `hytale-<patchline>-<version>.zip`; any destination is
/// forced to a `.zip` suffix.
fn destination_path(
    path_override: Option<PathBuf>,
    download_dir: Option<&Path>,
    patchline: &str,
    version: &str,
) -> PathBuf {
    let path = match path_override {
        Some(path) => path,
        None => {
            let name = format!("hytale-{}-{}.zip", patchline, version);
            match download_dir {
                Some(dir) => dir.join(name),
                None => PathBuf::from(name),
            }
        }
    };
    let has_zip = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    if has_zip {
        path
    } else {
        let mut raw = path.into_os_string();
        raw.push(".zip");
        PathBuf::from(raw)
    }
}
