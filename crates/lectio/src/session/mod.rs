//! Authenticated session against one Lectio institution.
//!
//! Handles the login handshake:
//! 1. GET login.aspx (a 404 or a redirect away from the institution means it does not exist)
//! 2. Read the hidden anti-forgery fields
//! 3. POST them back together with the credentials
//! 4. Landing back on login.aspx means the credentials were rejected
//!
//! Every request is checked for the expiry signal (redirect to login.aspx with
//! `prevurl`). With stored credentials the manager logs in again and replays
//! the request exactly once.

mod login;
#[cfg(test)]
pub(crate) mod testing;
mod transport;

pub use login::{Credentials, LoginTokens};
pub use transport::{Method, PortalRequest, PortalResponse, ReqwestTransport, Transport};

use rand::Rng;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::LectioError;
use login::{ensure_institution_exists, is_expiry_redirect, is_login_page, parse_login_tokens};

/// Where the session manager is in its login lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    /// No login performed yet, or logged out
    Unauthenticated,
    /// Login handshake in flight
    Authenticating,
    /// Last login succeeded
    Authenticated,
    /// Login was rejected; only a new `authenticate` call leaves this state
    Failed,
}

/// Owns one cookie session for one institution.
///
/// Not meant for concurrent use: everything that may touch the session takes
/// `&mut self`. Hold one manager per logical user.
pub struct SessionManager<T: Transport = ReqwestTransport> {
    transport: T,
    config: ClientConfig,
    credentials: Option<Credentials>,
    state: SessionState,
}

impl SessionManager<ReqwestTransport> {
    /// Creates a manager backed by a `reqwest` client.
    pub fn new(config: ClientConfig) -> Result<Self, LectioError> {
        let transport = ReqwestTransport::new(config.clone())?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> SessionManager<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            transport,
            config,
            credentials: None,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns true if credentials are kept for automatic re-login.
    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Logs in, replacing any existing session.
    ///
    /// # Arguments
    /// * `username`, `password` - Lectio credentials for the configured institution
    /// * `persist_credentials` - Keep the pair for transparent re-login when the session expires
    ///
    /// # Returns
    /// * `Err(InstitutionNotFound)` - before any credentials are sent
    /// * `Err(IncorrectCredentials)` - if the portal stays on the login page
    pub async fn authenticate(
        &mut self,
        username: &str,
        password: &str,
        persist_credentials: bool,
    ) -> Result<(), LectioError> {
        let correlation_id = generate_correlation_id();
        let credentials = Credentials::new(username, password);
        self.credentials = None;

        self.login(&credentials, &correlation_id).await?;

        if persist_credentials {
            self.credentials = Some(credentials);
        }
        Ok(())
    }

    /// Sends a request to a page of the institution, e.g. `"forside.aspx"`.
    ///
    /// May log in again (and replay the request once) if the session expired,
    /// so it can be slow and it mutates the session.
    pub async fn request(
        &mut self,
        path: &str,
        method: Method,
        form: Option<Vec<(String, String)>>,
    ) -> Result<PortalResponse, LectioError> {
        let correlation_id = generate_correlation_id();
        let request = PortalRequest {
            method,
            url: self.config.page_url(path)?,
            form,
        };

        debug!(
            correlation_id = %correlation_id,
            url = %request.url,
            method = ?request.method,
            "Sending request"
        );

        let response = self.transport.send(&request).await?;
        if !self.is_expired(&response) {
            return Ok(response);
        }

        warn!(
            correlation_id = %correlation_id,
            url = %response.url,
            "Session expired - redirected to login"
        );

        let Some(credentials) = self.credentials.clone() else {
            self.state = SessionState::Unauthenticated;
            return Err(LectioError::Unauthenticated {
                message: "session expired and no credentials are stored".to_string(),
            });
        };

        self.login(&credentials, &correlation_id).await?;

        let replay = self.transport.send(&request).await?;
        if self.is_expired(&replay) {
            warn!(
                correlation_id = %correlation_id,
                "Session could not be restored after re-login"
            );
            return Err(self.reject(
                "could not restore session, probably incorrect credentials",
            ));
        }

        info!(
            correlation_id = %correlation_id,
            url = %replay.url,
            "Request replayed after re-login"
        );
        Ok(replay)
    }

    /// GET shorthand for [`Self::request`].
    pub async fn get(&mut self, path: &str) -> Result<PortalResponse, LectioError> {
        self.request(path, Method::Get, None).await
    }

    /// Throws away the cookie session. Stored credentials are kept.
    pub fn log_out(&mut self) -> Result<(), LectioError> {
        self.transport.reset()?;
        self.state = SessionState::Unauthenticated;
        info!(institution = self.config.institution_id, "Logged out");
        Ok(())
    }

    /// Runs the full login handshake on a fresh cookie session.
    async fn login(
        &mut self,
        credentials: &Credentials,
        correlation_id: &str,
    ) -> Result<(), LectioError> {
        let start = Instant::now();
        self.state = SessionState::Authenticating;

        info!(
            correlation_id = %correlation_id,
            institution = self.config.institution_id,
            "Logging in"
        );

        match self.login_handshake(credentials).await {
            Ok(()) => {
                self.state = SessionState::Authenticated;
                info!(
                    correlation_id = %correlation_id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Login succeeded"
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    correlation_id = %correlation_id,
                    error = %e,
                    "Login failed"
                );
                self.state = match &e {
                    LectioError::InstitutionNotFound { .. }
                    | LectioError::IncorrectCredentials { .. } => {
                        // A rejected pair must not be retried implicitly
                        self.credentials = None;
                        SessionState::Failed
                    }
                    _ => SessionState::Unauthenticated,
                };
                Err(e)
            }
        }
    }

    async fn login_handshake(&mut self, credentials: &Credentials) -> Result<(), LectioError> {
        let institution_id = self.config.institution_id;
        self.transport.reset()?;

        let login_url = self.config.login_url()?;
        let login_page = self
            .transport
            .send(&PortalRequest::get(login_url.clone()))
            .await?;
        ensure_institution_exists(&login_page, institution_id)?;

        let tokens = parse_login_tokens(&login_page.body)?;
        let response = self
            .transport
            .send(&PortalRequest::post_form(login_url, tokens.form(credentials)))
            .await?;

        if is_login_page(&response.url, institution_id) {
            return Err(LectioError::IncorrectCredentials {
                message: "login page was returned after submitting credentials".to_string(),
            });
        }

        if !response.is_success() {
            return Err(LectioError::UnexpectedResponse {
                message: format!("login submission returned status {}", response.status),
            });
        }

        Ok(())
    }

    fn is_expired(&self, response: &PortalResponse) -> bool {
        is_expiry_redirect(&response.url, self.config.institution_id)
    }

    fn reject(&mut self, message: &str) -> LectioError {
        self.state = SessionState::Failed;
        self.credentials = None;
        LectioError::IncorrectCredentials {
            message: message.to_string(),
        }
    }
}

/// Generates a unique correlation ID for request tracing.
fn generate_correlation_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros();
    let random: u32 = rand::thread_rng().gen();
    format!("{:x}-{:08x}", timestamp & 0xFFFFFFFF, random)
}
