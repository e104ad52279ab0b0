use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::model::{Credentials, Settings};

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy.
pub struct Config {
    /// Master switch for the automation (TWEETSYNC_ENABLED).
    pub enabled: bool,
    pub bluesky_handle: String,
    /// App password for the target account. Only checked for presence; the
    /// composer runs in the user's signed-in browser session.
    pub bluesky_app_password: String,
    /// Source-platform username. Stored for reference; extraction reads the
    /// signed-in username off the page instead.
    pub twitter_username: String,
    pub db_path: String,
    /// Per-element wait timeout for the publisher.
    pub wait_timeout: Duration,
    /// DevTools websocket of the browser to drive (cdp feature).
    pub chrome_ws_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup. `load` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled = match lookup("TWEETSYNC_ENABLED") {
            Some(v) => parse_bool(&v)
                .with_context(|| format!("TWEETSYNC_ENABLED must be true or false, got {v:?}"))?,
            None => false,
        };

        let wait_timeout = match lookup("TWEETSYNC_WAIT_TIMEOUT_MS") {
            Some(v) => Duration::from_millis(v.trim().parse().with_context(|| {
                format!("TWEETSYNC_WAIT_TIMEOUT_MS must be a number of milliseconds, got {v:?}")
            })?),
            None => crate::wait::DEFAULT_TIMEOUT,
        };

        Ok(Self {
            enabled,
            bluesky_handle: lookup("BLUESKY_HANDLE").unwrap_or_default(),
            bluesky_app_password: lookup("BLUESKY_APP_PASSWORD").unwrap_or_default(),
            twitter_username: lookup("TWITTER_USERNAME").unwrap_or_default(),
            db_path: lookup("TWEETSYNC_DB_PATH").unwrap_or_else(|| "./tweetsync.db".to_string()),
            wait_timeout,
            chrome_ws_url: lookup("CHROME_WS_URL").filter(|v| !v.is_empty()),
        })
    }

    /// Target credentials, present only when both handle and password are set.
    pub fn credentials(&self) -> Option<Credentials> {
        if self.bluesky_handle.is_empty() || self.bluesky_app_password.is_empty() {
            return None;
        }
        Some(Credentials {
            username: self.bluesky_handle.clone(),
            password: self.bluesky_app_password.clone(),
        })
    }

    /// The settings view handed to the background service and publisher.
    pub fn settings(&self) -> Settings {
        Settings {
            is_enabled: self.enabled,
            target_credentials: self.credentials(),
            source_username: self.twitter_username.clone(),
        }
    }

    /// Check that automation is switched on.
    /// Call this before driving any page.
    pub fn require_enabled(&self) -> Result<()> {
        if !self.enabled {
            anyhow::bail!(
                "Automation is disabled. Set TWEETSYNC_ENABLED=true in your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        Ok(())
    }

    /// Check that the target account is configured.
    /// Call this before a direct sync.
    pub fn require_credentials(&self) -> Result<()> {
        if self.bluesky_handle.is_empty() {
            anyhow::bail!(
                "BLUESKY_HANDLE not set. Add it to your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        if self.bluesky_app_password.is_empty() {
            anyhow::bail!(
                "BLUESKY_APP_PASSWORD not set. This operation requires the target account.\n\
                 Add it to your .env file. See .env.example for details."
            );
        }
        Ok(())
    }

    /// Check that a browser endpoint is configured.
    #[cfg(feature = "cdp")]
    pub fn require_browser(&self) -> Result<&str> {
        self.chrome_ws_url.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "CHROME_WS_URL not set. Start Chrome with --remote-debugging-port=9222\n\
                 and set CHROME_WS_URL to its webSocketDebuggerUrl."
            )
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
