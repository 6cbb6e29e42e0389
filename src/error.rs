use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::ParseError;

use crate::browser::RenderError;

/// The sample a failed capture was taking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Before,
    After { delay_ms: u64 },
    /// A single capture outside a comparison.
    Page,
}

/// A fatal capture-stage failure. Aborts the whole comparison.
#[derive(Debug, Error)]
pub struct CaptureFailure {
    pub phase: CapturePhase,
    #[source]
    pub source: RenderError,
}

impl std::fmt::Display for CaptureFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.phase {
            CapturePhase::Before => write!(f, "Failed to capture before: {}", self.source),
            CapturePhase::Page => write!(f, "Failed to capture page: {}", self.source),
            CapturePhase::After { delay_ms } => write!(
                f,
                "Failed to capture after at {}ms: {}",
                delay_ms, self.source
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] ParseError),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Capture(#[from] CaptureFailure),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GuardError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        GuardError::InvalidRequest(message.into())
    }

    /// Message surfaced to callers in `{status: "failed", error}` responses.
    pub fn caller_message(&self) -> String {
        match self {
            GuardError::Capture(failure) => failure.to_string(),
            GuardError::InvalidRequest(msg) | GuardError::NotFound(msg) => msg.clone(),
            other => other.to_string(),
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            GuardError::Io(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Check file paths/permissions for the artifacts directory and database.",
            ),
            GuardError::InvalidUrl(e) => ErrorPayload::new(
                ErrorCategory::Request,
                e.to_string(),
                "Verify URL/format (e.g., https://example.com).",
            ),
            GuardError::Image(e) => ErrorPayload::new(
                ErrorCategory::Image,
                e.to_string(),
                "Verify the screenshot files are readable PNGs.",
            ),
            GuardError::Serialization(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Check JSON inputs; run with --verbose for details.",
            ),
            GuardError::Capture(failure) => {
                let message = failure.to_string();
                let lower = message.to_ascii_lowercase();
                let remediation = if lower.contains("playwright npm package is missing") {
                    "Install Playwright (e.g., `npm install playwright` and `npx playwright install chromium`)."
                } else if lower.contains("not found on path") || lower.contains("node command") {
                    "Install Node.js and ensure the node binary is on PATH."
                } else if lower.contains("timeout") || lower.contains("timed out") {
                    "Ensure the page finishes loading within the navigation timeout (--nav-timeout), or check that the URL is reachable."
                } else if lower.contains("fixture") {
                    "Check PAGEGUARD_FIXTURE_DIR contains a <key>.json capture for every URL (fixture://name or host_path)."
                } else {
                    "Check that both URLs are reachable from this machine; the comparison is not retried."
                };
                ErrorPayload::new(ErrorCategory::Capture, message, remediation)
            }
            GuardError::Storage(e) => ErrorPayload::new(
                ErrorCategory::Storage,
                e.to_string(),
                "Check the --db path is writable and not locked by another process.",
            ),
            GuardError::InvalidRequest(msg) => ErrorPayload::new(
                ErrorCategory::Request,
                msg.to_string(),
                "Provide --before, --after and --site-id; delays must be positive milliseconds.",
            ),
            GuardError::NotFound(msg) => ErrorPayload::new(
                ErrorCategory::Storage,
                msg.to_string(),
                "Run `pageguard history` to list stored report ids.",
            ),
            GuardError::Config(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("viewport") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Use WIDTHxHEIGHT with positive values (e.g., --viewport 1920x1080).",
                    )
                } else if lower.contains("delay") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Supply up to 3 positive delays in milliseconds (e.g., --delays 1000,3000).",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Check flags/paths and the config file (TOML).",
                    )
                }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, GuardError>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Config,
    Request,
    Capture,
    Image,
    Storage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: String, remediation: impl Into<String>) -> Self {
        Self {
            category,
            message,
            remediation: Some(remediation.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn before_timeout() -> GuardError {
        GuardError::Capture(CaptureFailure {
            phase: CapturePhase::Before,
            source: RenderError::Script {
                status: "error".into(),
                message: "Navigation timeout of 60000 ms exceeded".into(),
            },
        })
    }

    #[test]
    fn capture_failure_message_names_the_phase() {
        assert_eq!(
            before_timeout().caller_message(),
            "Failed to capture before: Navigation timeout of 60000 ms exceeded"
        );

        let after = CaptureFailure {
            phase: CapturePhase::After { delay_ms: 2000 },
            source: RenderError::Script {
                status: "error".into(),
                message: "net::ERR_CONNECTION_REFUSED".into(),
            },
        };
        assert_eq!(
            after.to_string(),
            "Failed to capture after at 2000ms: net::ERR_CONNECTION_REFUSED"
        );
    }

    #[test]
    fn capture_payload_includes_timeout_hint() {
        let payload = before_timeout().to_payload();
        assert_eq!(payload.category, ErrorCategory::Capture);
        let remediation = payload.remediation.unwrap_or_default();
        assert!(
            remediation.contains("--nav-timeout"),
            "expected timeout remediation, got: {remediation}"
        );
    }

    #[test]
    fn config_payload_includes_viewport_hint() {
        let err = GuardError::Config("Invalid viewport 0x900".to_string());
        let remediation = err.to_payload().remediation.unwrap_or_default();
        assert!(
            remediation.contains("WIDTHxHEIGHT"),
            "expected viewport remediation, got: {remediation}"
        );
    }

    #[test]
    fn config_payload_uses_default_remediation_for_other_messages() {
        let err = GuardError::Config("Some other config issue".to_string());
        let remediation = err.to_payload().remediation.unwrap_or_default();
        assert!(remediation.contains("Check flags/paths"));
    }

    #[test]
    fn invalid_request_message_is_passed_through() {
        let err = GuardError::invalid_request("Missing: beforeUrl, afterUrl, siteId");
        assert_eq!(err.caller_message(), "Missing: beforeUrl, afterUrl, siteId");
        assert_eq!(err.to_payload().category, ErrorCategory::Request);
    }
}
