//! API response types for consistent JSON responses
//!
//! This module provides standardized response types for the status API,
//! ensuring consistent response structures across all endpoints.

use serde::Serialize;

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful
    pub success: bool,
    /// Response message
    pub message: String,
    /// Response data (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful response with data
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Create a failed response without data
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// Connection counts reported by the status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    /// Server version
    pub version: String,
    /// Open WebSocket connections
    pub connections: usize,
    /// Connections holding a seat in the room
    pub playing: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_response_success() {
        let response = ApiResponse::success("ok", 3);
        assert!(response.success);
        assert_eq!(response.data, Some(3));
    }

    #[test]
    fn test_failure_omits_data() {
        let response: ApiResponse<()> = ApiResponse::failure("Game dispatcher unavailable");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({"success": false, "message": "Game dispatcher unavailable"})
        );
    }

    #[test]
    fn test_status_serialization() {
        let status = ServerStatus {
            version: "0.1.0".to_string(),
            connections: 3,
            playing: 2,
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["connections"], 3);
        assert_eq!(value["playing"], 2);
    }
}
