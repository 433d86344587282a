/// Client configuration: portal location, institution and HTTP settings
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::error::LectioError;

/// Public Lectio host.
const LECTIO_HOST: &str = "https://www.lectio.dk";

/// Login page, relative to the institution base.
pub(crate) const LOGIN_PAGE: &str = "login.aspx";

/// Configuration for a [`crate::SessionManager`] and its transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Scheme and host of the portal, without trailing slash
    pub host: String,
    /// Institution id, as seen in `https://www.lectio.dk/lectio/<id>/login.aspx`
    pub institution_id: u32,
    /// User agent string
    pub user_agent: String,
    /// Timeout for establishing a connection
    pub connect_timeout_secs: u64,
    /// Timeout for a whole request; `None` keeps the transport default
    pub request_timeout_secs: Option<u64>,
    /// Maximum number of redirects followed per request
    pub max_redirects: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: LECTIO_HOST.to_string(),
            institution_id: 0,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: None,
            max_redirects: 10,
        }
    }
}

impl ClientConfig {
    /// Creates a default configuration for the given institution.
    pub fn new(institution_id: u32) -> Self {
        Self {
            institution_id,
            ..Self::default()
        }
    }

    /// Loads a configuration from a JSON file
    ///
    /// # Arguments
    /// * `path` - Path to the JSON file; missing keys fall back to defaults
    ///
    /// # Returns
    /// * `Ok(ClientConfig)` - Loaded configuration
    /// * `Err` - If the file can't be read or parsed
    pub fn load_from_file(path: &Path) -> Result<Self, LectioError> {
        let content = fs::read_to_string(path).map_err(|e| LectioError::Config {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;

        serde_json::from_str(&content).map_err(|e| LectioError::Config {
            message: format!("Failed to parse {}: {}", path.display(), e),
        })
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// The portal host as a URL, used to resolve site-absolute links.
    pub fn host_url(&self) -> Result<Url, LectioError> {
        Ok(Url::parse(&self.host)?)
    }

    /// Base URL of the institution, e.g. `https://www.lectio.dk/lectio/123/`.
    pub fn institution_url(&self) -> Result<Url, LectioError> {
        let base = format!(
            "{}/lectio/{}/",
            self.host.trim_end_matches('/'),
            self.institution_id
        );
        Ok(Url::parse(&base)?)
    }

    /// Resolves a page path (optionally with query) against the institution base.
    pub fn page_url(&self, path: &str) -> Result<Url, LectioError> {
        Ok(self.institution_url()?.join(path.trim_start_matches('/'))?)
    }

    /// Resolves a link found in a page (usually `/lectio/<inst>/...`) against the host.
    pub fn absolute_link(&self, href: &str) -> Result<Url, LectioError> {
        Ok(self.host_url()?.join(href)?)
    }

    pub fn login_url(&self) -> Result<Url, LectioError> {
        self.page_url(LOGIN_PAGE)
    }
}
