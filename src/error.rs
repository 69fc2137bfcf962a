//! Error types and handling for the `AirAware` application

use thiserror::Error;

/// Main error type for the `AirAware` application
#[derive(Error, Debug)]
pub enum AirAwareError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// API communication errors
    #[error("API error: {message}")]
    Api {
        message: String,
        status: Option<u16>,
    },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// A location, station or resource that does not exist upstream
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Malformed payloads (JSON, CSV, XML, gzip)
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Cache operation errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// General application errors
    #[error("Application error: {message}")]
    General { message: String },
}

impl AirAwareError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new API error without an HTTP status
    pub fn api<S: Into<String>>(message: S) -> Self {
        Self::Api {
            message: message.into(),
            status: None,
        }
    }

    /// Create a new API error carrying the upstream HTTP status
    pub fn api_status<S: Into<String>>(message: S, status: u16) -> Self {
        Self::Api {
            message: message.into(),
            status: Some(status),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create a new cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create a new general error
    pub fn general<S: Into<String>>(message: S) -> Self {
        Self::General {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            AirAwareError::Config { message } => {
                format!("Configuration error: {message}. Please check your config file and API keys.")
            }
            AirAwareError::Api {
                status: Some(401 | 403),
                ..
            } => "An upstream service rejected our credentials. Please check your OpenAQ API key."
                .to_string(),
            AirAwareError::Api {
                status: Some(429), ..
            } => "An upstream service is rate limiting us. Please try again in a minute.".to_string(),
            AirAwareError::Api {
                message,
                status: Some(400..=499),
            } => format!("An upstream service rejected the request: {message}"),
            AirAwareError::Api { .. } => {
                "Unable to connect to external services. Please check your internet connection."
                    .to_string()
            }
            AirAwareError::Validation { message } => {
                format!("Invalid input: {message}")
            }
            AirAwareError::NotFound { message } => message.clone(),
            AirAwareError::Parse { .. } => {
                "Received data in an unexpected format from an upstream service.".to_string()
            }
            AirAwareError::Cache { .. } => {
                "Cache operation failed. You may need to clear your cache.".to_string()
            }
            AirAwareError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
            AirAwareError::General { message } => message.clone(),
        }
    }
}

impl From<reqwest::Error> for AirAwareError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::api_status(err.to_string(), status.as_u16()),
            None => Self::api(err.to_string()),
        }
    }
}

impl From<reqwest_middleware::Error> for AirAwareError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(err) => err.into(),
            reqwest_middleware::Error::Middleware(err) => Self::api(format!("{err:#}")),
        }
    }
}

impl From<serde_json::Error> for AirAwareError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_err = AirAwareError::config("missing API key");
        assert!(matches!(config_err, AirAwareError::Config { .. }));

        let api_err = AirAwareError::api("connection failed");
        assert!(matches!(api_err, AirAwareError::Api { status: None, .. }));

        let validation_err = AirAwareError::validation("invalid dates");
        assert!(matches!(validation_err, AirAwareError::Validation { .. }));
    }

    #[test]
    fn test_user_messages() {
        let config_err = AirAwareError::config("test");
        assert!(config_err.user_message().contains("Configuration error"));

        let api_err = AirAwareError::api("test");
        assert!(api_err.user_message().contains("Unable to connect"));

        let auth_err = AirAwareError::api_status("nope", 401);
        assert!(auth_err.user_message().contains("API key"));

        let validation_err = AirAwareError::validation("test input");
        assert!(validation_err.user_message().contains("test input"));

        let missing = AirAwareError::not_found("Bounding box not found for location: Atlantis");
        assert_eq!(
            missing.user_message(),
            "Bounding box not found for location: Atlantis"
        );
    }

    #[test]
    fn test_rate_limit_message() {
        let err = AirAwareError::api_status("slow down", 429);
        assert!(matches!(err, AirAwareError::Api { status: Some(429), .. }));
        assert!(err.user_message().contains("rate limiting"));
    }

    #[test]
    fn test_rejected_request_message_keeps_reason() {
        let err = AirAwareError::api_status(
            "Open-Meteo request failed with status: 400 Bad Request - Parameter 'start_date' is out of allowed range",
            400,
        );
        let message = err.user_message();
        assert!(message.contains("rejected the request"), "{message}");
        assert!(message.contains("start_date"), "{message}");
        assert!(!message.contains("internet connection"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AirAwareError = io_err.into();
        assert!(matches!(err, AirAwareError::Io { .. }));
    }
}
