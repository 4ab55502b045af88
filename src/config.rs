//! Runtime configuration
//!
//! Values come from command-line flags, then environment variables, then
//! defaults. Invalid values fall back to the default with a warning rather
//! than aborting.

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Production API
pub const DEFAULT_API_URL: &str = "https://cardscore.cosinus.ma/api";

pub const API_URL_VAR: &str = "CARDSCORE_API_URL";
pub const SESSION_DIR_VAR: &str = "CARDSCORE_SESSION_DIR";
pub const TIMEOUT_VAR: &str = "CARDSCORE_TIMEOUT_SECS";

/// Session directory name under the home directory
const SESSION_DIR_NAME: &str = ".cardscore";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// API base URL, without trailing slash
    pub api_url: String,
    /// Directory holding the persisted session
    pub session_dir: PathBuf,
    /// Per-request timeout; requests wait indefinitely when unset
    pub timeout: Option<Duration>,
}

impl Config {
    /// Build the configuration from flags and the process environment
    pub fn load(api_url: Option<String>, session_dir: Option<PathBuf>) -> Self {
        Self::from_sources(api_url, session_dir, |key| env::var(key).ok())
    }

    /// Build the configuration from flags and an arbitrary variable lookup
    pub fn from_sources(
        api_url: Option<String>,
        session_dir: Option<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let api_url = api_url
            .or_else(|| lookup(API_URL_VAR))
            .map(|url| validate_url(&url))
            .unwrap_or_else(|| {
                info!("{API_URL_VAR} not set, using default: {DEFAULT_API_URL}");
                DEFAULT_API_URL.to_string()
            });

        let session_dir = session_dir
            .or_else(|| lookup(SESSION_DIR_VAR).map(PathBuf::from))
            .unwrap_or_else(|| {
                let home = lookup("HOME").unwrap_or_else(|| {
                    warn!("HOME not set, keeping the session in the working directory");
                    ".".to_string()
                });
                PathBuf::from(home).join(SESSION_DIR_NAME)
            });

        let timeout = lookup(TIMEOUT_VAR).and_then(|raw| match raw.trim().parse::<u64>() {
            Ok(0) | Err(_) => {
                warn!("Invalid {TIMEOUT_VAR} value '{raw}', requests will not time out");
                None
            }
            Ok(secs) => Some(Duration::from_secs(secs)),
        });

        Self {
            api_url,
            session_dir,
            timeout,
        }
    }
}

fn validate_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        warn!("Invalid API URL '{url}', using default ({DEFAULT_API_URL})");
        DEFAULT_API_URL.to_string()
    }
}
