//! Scripted in-memory transport for driving the session manager in tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use url::Url;

use super::transport::{PortalRequest, PortalResponse, Transport};
use crate::error::LectioError;

pub const INST: u32 = 123;

pub const LOGIN_HTML: &str = r#"<html><body><form>
    <input type="hidden" name="__VIEWSTATEX" value="vsx" />
    <input type="hidden" name="__EVENTVALIDATION" value="ev" />
</form></body></html>"#;

/// Replays canned responses in order and records what was sent.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<PortalResponse>>,
    sent: Mutex<Vec<PortalRequest>>,
    resets: usize,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<PortalResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<PortalRequest> {
        self.sent.lock().unwrap().clone()
    }

    /// Number of requests whose URL path ends with `suffix`.
    pub fn count_sent(&self, suffix: &str) -> usize {
        self.sent()
            .iter()
            .filter(|r| r.url.path().ends_with(suffix))
            .count()
    }

    pub fn resets(&self) -> usize {
        self.resets
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &PortalRequest) -> Result<PortalResponse, LectioError> {
        self.sent.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LectioError::Network {
                message: format!("no scripted response for {}", request.url),
            })
    }

    fn reset(&mut self) -> Result<(), LectioError> {
        self.resets += 1;
        Ok(())
    }
}

pub fn response(status: u16, url: &str, body: &str) -> PortalResponse {
    PortalResponse {
        status,
        url: Url::parse(url).unwrap(),
        body: body.to_string(),
    }
}

/// Institution page with the given path and body.
pub fn page(path: &str, body: &str) -> PortalResponse {
    response(
        200,
        &format!("https://www.lectio.dk/lectio/{}/{}", INST, path),
        body,
    )
}

pub fn login_page() -> PortalResponse {
    page("login.aspx", LOGIN_HTML)
}

/// Successful login submission: the portal moves on to the front page.
pub fn login_accepted() -> PortalResponse {
    page("forside.aspx", "<html></html>")
}

/// Rejected login submission: the portal stays on the login page.
pub fn login_rejected() -> PortalResponse {
    page("login.aspx", LOGIN_HTML)
}

/// Session expiry signal.
pub fn expired() -> PortalResponse {
    page("login.aspx?prevurl=forside.aspx", LOGIN_HTML)
}
