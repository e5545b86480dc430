//! Response DTOs for the webhook endpoint.

use serde::Serialize;

use crate::domain::webhook::WebhookAck;

/// Body returned to the provider on a 2xx acknowledgment.
#[derive(Debug, Serialize)]
pub struct WebhookAckResponse {
    pub received: bool,
    /// "applied", "already_applied", or "acknowledged".
    pub status: &'static str,
}

impl From<WebhookAck> for WebhookAckResponse {
    fn from(ack: WebhookAck) -> Self {
        let status = match ack {
            WebhookAck::Applied => "applied",
            WebhookAck::AlreadyApplied => "already_applied",
            WebhookAck::Acknowledged => "acknowledged",
        };
        Self {
            received: true,
            status,
        }
    }
}

/// Error body for rejected deliveries.
#[derive(Debug, Serialize)]
pub struct WebhookErrorResponse {
    pub error: String,
    pub retryable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_maps_to_status_strings() {
        assert_eq!(WebhookAckResponse::from(WebhookAck::Applied).status, "applied");
        assert_eq!(
            WebhookAckResponse::from(WebhookAck::AlreadyApplied).status,
            "already_applied"
        );
        assert_eq!(
            WebhookAckResponse::from(WebhookAck::Acknowledged).status,
            "acknowledged"
        );
    }

    #[test]
    fn ack_serializes_as_received() {
        let json = serde_json::to_string(&WebhookAckResponse::from(WebhookAck::Applied)).unwrap();
        assert_eq!(json, r#"{"received":true,"status":"applied"}"#);
    }
}
