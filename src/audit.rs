/// Audit events for security-relevant actions.
///
/// Login failures, password-reset requests and completions, and email
/// dispatch outcomes all leave a structured trail here.

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    /// Action (LOGIN, RESET_REQUEST, RESET_CONFIRM, SEND_EMAIL, ...)
    pub action: String,
    /// Resource type (user, token, email)
    pub resource_type: String,
    pub resource_id: Option<String>,
    /// SUCCESS or FAILURE
    pub status: String,
    pub message: String,
}

impl AuditEvent {
    pub fn new(action: &str, resource_type: &str, status: &str, message: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            action: action.to_string(),
            resource_type: resource_type.to_string(),
            resource_id: None,
            status: status.to_string(),
            message: message.into(),
        }
    }

    pub fn with_resource_id(mut self, id: String) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn emit(&self) {
        if self.status == "FAILURE" {
            tracing::warn!(
                event_id = %self.event_id,
                action = %self.action,
                resource_type = %self.resource_type,
                resource_id = ?self.resource_id,
                status = %self.status,
                message = %self.message,
                "Audit event"
            );
        } else {
            tracing::info!(
                event_id = %self.event_id,
                action = %self.action,
                resource_type = %self.resource_type,
                resource_id = ?self.resource_id,
                status = %self.status,
                message = %self.message,
                "Audit event"
            );
        }
    }
}
