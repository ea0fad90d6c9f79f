//! Token storage and login contract for the identity service.
//!
//! The browser handshake itself happens outside this crate. What matters here
//! is the data contract: the callback delivers a JSON body with an
//! `access_token` and a `refresh_token`, and the pair is persisted at a fixed
//! path so the next launch can skip login.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::datastore::write_atomic;
use crate::notify::spawn_detached;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    fn is_complete(&self) -> bool {
        !self.access_token.trim().is_empty() && !self.refresh_token.trim().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn from_config(cfg: &Config, data_dir: &Path) -> Self {
        let path = cfg
            .get_path("session.token_path")
            .unwrap_or_else(|| data_dir.join("session.json"));
        debug!(path = %path.display(), "session file");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> anyhow::Result<Option<TokenPair>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("failed reading {}", self.path.display()));
            }
        };

        let pair: TokenPair = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.path.display()))?;
        if !pair.is_complete() {
            warn!("stored session is missing a token");
            return Ok(None);
        }
        Ok(Some(pair))
    }

    pub fn has_valid_session(&self) -> bool {
        match self.load() {
            Ok(pair) => pair.is_some(),
            Err(err) => {
                warn!(error = %err, "ignoring unreadable session file");
                false
            }
        }
    }

    #[instrument(skip(self, pair), fields(path = %self.path.display()))]
    pub fn save(&self, pair: &TokenPair) -> anyhow::Result<()> {
        let payload = serde_json::to_vec_pretty(pair)?;
        write_atomic(&self.path, &payload)?;
        info!("session saved");
        Ok(())
    }

    /// Deletes the stored pair. Returns whether one existed.
    pub fn clear(&self) -> anyhow::Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err).with_context(|| format!("failed removing {}", self.path.display())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenCallback {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// One pending login. Completion runs the callback exactly once.
pub struct LoginFlow<F>
where
    F: FnOnce(&TokenPair),
{
    session: SessionFile,
    authorize_url: String,
    on_complete: Option<F>,
}

impl<F> LoginFlow<F>
where
    F: FnOnce(&TokenPair),
{
    /// Builds the authorization URL from `auth.url` / `auth.redirect_uri`.
    /// Opening a browser is left to [`open_in_browser`].
    pub fn begin(cfg: &Config, session: SessionFile, on_complete: F) -> anyhow::Result<Self> {
        let auth_url = cfg
            .get("auth.url")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("auth.url is not configured"))?;
        let redirect_uri = cfg
            .get("auth.redirect_uri")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("auth.redirect_uri is not configured"))?;

        let authorize_url = authorize_url(&auth_url, &redirect_uri);
        info!(url = %authorize_url, "login flow started");
        Ok(Self {
            session,
            authorize_url,
            on_complete: Some(on_complete),
        })
    }

    pub fn authorize_url(&self) -> &str {
        &self.authorize_url
    }

    pub fn is_complete(&self) -> bool {
        self.on_complete.is_none()
    }

    /// Accepts the callback body, persists the pair and fires the callback.
    #[instrument(skip(self, body))]
    pub fn receive_tokens(&mut self, body: &str) -> anyhow::Result<TokenPair> {
        if self.is_complete() {
            return Err(anyhow!("login already completed"));
        }

        let callback: TokenCallback =
            serde_json::from_str(body.trim()).context("token callback is not valid JSON")?;
        let pair = match (callback.access_token, callback.refresh_token) {
            (Some(access_token), Some(refresh_token)) => TokenPair {
                access_token,
                refresh_token,
            },
            _ => return Err(anyhow!("token not received")),
        };
        if !pair.is_complete() {
            return Err(anyhow!("token not received"));
        }

        self.session.save(&pair)?;
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(&pair);
        }
        Ok(pair)
    }
}

pub fn authorize_url(auth_url: &str, redirect_uri: &str) -> String {
    format!(
        "{}/auth/v1/authorize?provider=google&redirect_to={}",
        auth_url.trim_end_matches('/'),
        redirect_uri
    )
}

/// Hands `url` to the platform opener without waiting for it.
pub fn open_in_browser(cfg: &Config, url: &str) -> anyhow::Result<()> {
    let opener = cfg.get("auth.opener").unwrap_or_else(|| default_opener().to_string());
    debug!(opener = %opener, "opening browser");
    spawn_detached(&opener, vec![url.into()])?;
    Ok(())
}

fn default_opener() -> &'static str {
    if cfg!(target_os = "macos") { "open" } else { "xdg-open" }
}
