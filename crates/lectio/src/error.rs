//! Error types for the Lectio client.

use thiserror::Error;

/// Errors that can occur while talking to Lectio or decoding its pages.
#[derive(Debug, Error, Clone)]
pub enum LectioError {
    /// The configured institution id does not resolve at the portal
    #[error("Institution {institution_id} does not exist")]
    InstitutionNotFound { institution_id: u32 },

    /// Lectio rejected the credentials, or an expired session could not be restored with them
    #[error("Incorrect credentials: {message}")]
    IncorrectCredentials { message: String },

    /// The session expired and there are no stored credentials to log in again with
    #[error("Not authenticated: {message}")]
    Unauthenticated { message: String },

    /// A single schedule entry did not match the expected text layout
    #[error("Malformed schedule entry: {reason}")]
    MalformedScheduleEntry { reason: String, raw: String },

    /// Network/HTTP request failed
    #[error("Network error: {message}")]
    Network { message: String },

    /// Server returned an unexpected response
    #[error("Unexpected response: {message}")]
    UnexpectedResponse { message: String },

    /// Failed to parse HTML content
    #[error("Parse error: {message}")]
    ParseError { message: String },

    /// URL parsing/construction failed
    #[error("URL error: {message}")]
    UrlError { message: String },

    /// Configuration could not be loaded
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl LectioError {
    pub(crate) fn malformed(reason: impl Into<String>, raw: &str) -> Self {
        LectioError::MalformedScheduleEntry {
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }

    /// Returns true if the caller has to supply (new) credentials before retrying.
    pub fn needs_reauth(&self) -> bool {
        matches!(
            self,
            LectioError::IncorrectCredentials { .. } | LectioError::Unauthenticated { .. }
        )
    }

    /// Returns true if this error is potentially transient and retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LectioError::Network { .. } | LectioError::UnexpectedResponse { .. }
        )
    }
}

impl From<reqwest::Error> for LectioError {
    fn from(err: reqwest::Error) -> Self {
        LectioError::Network {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for LectioError {
    fn from(err: url::ParseError) -> Self {
        LectioError::UrlError {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_errors_need_reauth() {
        let bad_creds = LectioError::IncorrectCredentials {
            message: "rejected".to_string(),
        };
        let no_creds = LectioError::Unauthenticated {
            message: "expired".to_string(),
        };
        let bad_row = LectioError::malformed("no time range", "Hold: 1.a Da");

        assert!(bad_creds.needs_reauth());
        assert!(no_creds.needs_reauth());
        assert!(!bad_row.needs_reauth());
        assert!(!bad_row.is_retryable());
    }
}
