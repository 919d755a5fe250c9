//! Reqwest-based transport for the licensing endpoint.
//!
//! The [`Transport`] trait is the fetch seam: the verifier only needs
//! "POST this form, give me status and body". [`HttpTransport`] is the
//! production implementation. Tests substitute a scripted one.

use crate::config::TransportConfig;
use crate::LicenseError;
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, USER_AGENT};

/// Raw HTTP response.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,

    /// Raw response body.
    pub body: Vec<u8>,
}

impl TransportResponse {
    fn from_response(response: Response) -> Result<Self, LicenseError> {
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| LicenseError::Transport(format!("Failed to read body: {}", e)))?
            .to_vec();

        Ok(Self { status, body })
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fetch capability used by the verifier.
///
/// Implementations return `Err(LicenseError::Transport)` for anything that
/// prevented a response from arriving (DNS, TLS, connect, timeout).
pub trait Transport: Send + Sync {
    /// POST `form` as `application/x-www-form-urlencoded` to `url`.
    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<TransportResponse, LicenseError>;
}

/// Blocking reqwest transport configured per session.
pub struct HttpTransport {
    client: Client,
    user_agent: String,
}

impl HttpTransport {
    /// Build a client for `product` from the session's transport settings.
    ///
    /// `reject_unauthorized = false` disables certificate validation on this
    /// client only.
    pub fn new(product: &str, config: &TransportConfig) -> Result<Self, LicenseError> {
        if !config.reject_unauthorized {
            tracing::warn!("TLS certificate validation disabled for this license session");
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.reject_unauthorized)
            .build()
            .map_err(|e| LicenseError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        let product = config.user_agent.as_deref().unwrap_or(product);

        Ok(Self {
            client,
            user_agent: build_user_agent(product),
        })
    }

    /// The User-Agent sent with every request.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

impl Transport for HttpTransport {
    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<TransportResponse, LicenseError> {
        let response = self
            .client
            .post(url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json")
            .form(form)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    LicenseError::Transport(format!("Request timed out: {}", e))
                } else {
                    LicenseError::Transport(format!("Request failed: {}", e))
                }
            })?;

        TransportResponse::from_response(response)
    }
}

/// Build a User-Agent string.
///
/// Format: `<product>/gumlock-<version>`
pub fn build_user_agent(product: &str) -> String {
    format!("{}/gumlock-{}", product, env!("CARGO_PKG_VERSION"))
}
