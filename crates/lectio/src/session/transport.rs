//! HTTP transport used by the session manager.
//!
//! The session manager only needs "send method + url + form, get back status,
//! effective URL and body". TLS, cookie storage and redirect following are the
//! transport's job.

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Client;
use url::Url;

use crate::config::ClientConfig;
use crate::error::LectioError;

/// HTTP method of a portal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A request against the portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalRequest {
    pub method: Method,
    pub url: Url,
    /// Form fields, sent url-encoded when present
    pub form: Option<Vec<(String, String)>>,
}

impl PortalRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            form: None,
        }
    }

    pub fn post_form(url: Url, form: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Post,
            url,
            form: Some(form),
        }
    }
}

/// A fully read response, after redirects were followed.
#[derive(Debug, Clone)]
pub struct PortalResponse {
    pub status: u16,
    /// The URL the final response came from
    pub url: Url,
    pub body: String,
}

impl PortalResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Something that can send requests within one cookie session.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a request, following redirects, and reads the whole body.
    async fn send(&self, request: &PortalRequest) -> Result<PortalResponse, LectioError>;

    /// Drops all cookies, starting a fresh unauthenticated session.
    fn reset(&mut self) -> Result<(), LectioError>;
}

/// `reqwest`-backed transport with an in-memory cookie jar.
pub struct ReqwestTransport {
    client: Client,
    config: ClientConfig,
}

impl ReqwestTransport {
    pub fn new(config: ClientConfig) -> Result<Self, LectioError> {
        let client = Self::build_client(&config)?;
        Ok(Self { client, config })
    }

    fn build_client(config: &ClientConfig) -> Result<Client, LectioError> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .redirect(Policy::limited(config.max_redirects))
            .user_agent(&config.user_agent)
            .connect_timeout(config.connect_timeout());

        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        builder.build().map_err(|e| LectioError::Network {
            message: format!("Failed to build HTTP client: {}", e),
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &PortalRequest) -> Result<PortalResponse, LectioError> {
        let builder = match request.method {
            Method::Get => self.client.get(request.url.clone()),
            Method::Post => self.client.post(request.url.clone()),
        };
        let builder = match &request.form {
            Some(form) => builder.form(form),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let url = response.url().clone();
        let body = response.text().await?;

        Ok(PortalResponse { status, url, body })
    }

    fn reset(&mut self) -> Result<(), LectioError> {
        // A new client is the only way to get an empty reqwest cookie jar
        self.client = Self::build_client(&self.config)?;
        Ok(())
    }
}
