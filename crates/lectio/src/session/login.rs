//! Login page handling: institution check, anti-forgery tokens and the
//! credential form.

use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

use super::transport::PortalResponse;
use crate::error::LectioError;

/// Hidden fields whose values must be echoed back on login.
const VIEWSTATE_FIELD: &str = "__VIEWSTATEX";
const EVENT_VALIDATION_FIELD: &str = "__EVENTVALIDATION";

const SUBMIT_TARGET: &str = "m$Content$submitbtn2";
const USERNAME_FIELD: &str = "m$Content$username";
const PASSWORD_FIELD: &str = "m$Content$password";

static VIEWSTATE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input[name='__VIEWSTATEX']").unwrap());
static EVENT_VALIDATION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input[name='__EVENTVALIDATION']").unwrap());

/// Username/password pair. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub(crate) username: String,
    pub(crate) password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &"<redacted>")
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Anti-forgery tokens read from the login page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginTokens {
    pub viewstate: String,
    pub event_validation: String,
}

impl LoginTokens {
    /// Builds the login form submission for the given credentials.
    pub fn form(&self, credentials: &Credentials) -> Vec<(String, String)> {
        [
            ("time", "0"),
            ("__EVENTTARGET", SUBMIT_TARGET),
            ("__EVENTARGUMENT", ""),
            ("__SCROLLPOSITION", ""),
            (VIEWSTATE_FIELD, self.viewstate.as_str()),
            ("__VIEWSTATEY_KEY", ""),
            ("__VIEWSTATE", ""),
            (EVENT_VALIDATION_FIELD, self.event_validation.as_str()),
            (USERNAME_FIELD, credentials.username.as_str()),
            (PASSWORD_FIELD, credentials.password.as_str()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }
}

/// Checks that the login page we got is really the institution's.
///
/// Lectio answers unknown institutions either with a 404 or by redirecting
/// away from `/lectio/<inst>/`.
pub fn ensure_institution_exists(
    response: &PortalResponse,
    institution_id: u32,
) -> Result<(), LectioError> {
    let marker = format!("/lectio/{}/", institution_id);

    if response.status == 404 || !response.url.path().contains(&marker) {
        return Err(LectioError::InstitutionNotFound { institution_id });
    }

    if !response.is_success() {
        return Err(LectioError::UnexpectedResponse {
            message: format!("login page returned status {}", response.status),
        });
    }

    Ok(())
}

/// Extracts the hidden anti-forgery fields from the login page.
pub fn parse_login_tokens(html: &str) -> Result<LoginTokens, LectioError> {
    let document = Html::parse_document(html);

    let field_value = |selector: &Selector, name: &str| {
        document
            .select(selector)
            .next()
            .and_then(|el| el.value().attr("value"))
            .map(str::to_string)
            .ok_or_else(|| LectioError::ParseError {
                message: format!("login page has no {} field", name),
            })
    };

    Ok(LoginTokens {
        viewstate: field_value(&VIEWSTATE_SELECTOR, VIEWSTATE_FIELD)?,
        event_validation: field_value(&EVENT_VALIDATION_SELECTOR, EVENT_VALIDATION_FIELD)?,
    })
}

/// Returns true if `url` is the institution login page.
pub fn is_login_page(url: &Url, institution_id: u32) -> bool {
    let login_path = format!("/{}/login.aspx", institution_id);
    url.path().to_lowercase().ends_with(&login_path)
}

/// The session expiry signal: a redirect to the login page carrying `prevurl`.
pub fn is_expiry_redirect(url: &Url, institution_id: u32) -> bool {
    is_login_page(url, institution_id)
        && url
            .query_pairs()
            .any(|(key, _)| key.eq_ignore_ascii_case("prevurl"))
}
