use crate::types::RoomId;
use thiserror::Error;

/// Result type for dashboard operations
pub type Result<T> = std::result::Result<T, ClimateError>;

/// Errors that can occur when talking to rooms or the weather service
#[derive(Error, Debug)]
pub enum ClimateError {
    /// HTTP transport error (connection refused, bad body, ...)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request timed out waiting for response
    #[error("Request timeout")]
    Timeout,

    /// Connection was closed before a response arrived
    #[error("Connection closed")]
    ConnectionClosed,

    /// Endpoint answered with an error flag set
    #[error("API error: {detail}")]
    ApiError {
        /// Error detail reported by the endpoint
        detail: String,
    },

    /// The room's sensor reading is unavailable
    #[error("Sensor error: {detail}")]
    SensorError {
        /// Error detail reported by the sensor
        detail: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration parsed but holds unusable values
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Two rooms were configured with the same id
    #[error("Duplicate room id: {0}")]
    DuplicateRoom(RoomId),

    /// No room with this id in the store
    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    /// Channel receive error
    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl ClimateError {
    /// Whether the request itself failed, as opposed to the endpoint
    /// answering with an error
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClimateError::Http(_) | ClimateError::Timeout | ClimateError::ConnectionClosed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(ClimateError::Timeout.is_transport());
        assert!(ClimateError::ConnectionClosed.is_transport());
        assert!(!ClimateError::ApiError { detail: "x".into() }.is_transport());
        assert!(!ClimateError::SensorError { detail: "x".into() }.is_transport());
        assert!(!ClimateError::RoomNotFound(3).is_transport());
    }

    #[test]
    fn test_local_errors_wrap_sources() {
        let err: ClimateError = toml::from_str::<toml::Value>("a = ").unwrap_err().into();
        assert!(matches!(err, ClimateError::Config(_)));
        assert!(!err.is_transport());

        let err: ClimateError = std::io::Error::from(std::io::ErrorKind::NotFound).into();
        assert!(matches!(err, ClimateError::Io(_)));
        assert!(!err.is_transport());
    }
}
