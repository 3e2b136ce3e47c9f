use serde::Serialize;

use crate::configuration::EmailSettings;
use crate::error::EmailError;
use crate::validators::is_valid_email;

/// Client for the HTTP mail relay.
///
/// Dispatch is fire-and-forget from the flows' point of view; callers that
/// must not block on delivery spawn the send onto the runtime.
#[derive(Clone)]
pub struct EmailClient {
    http_client: reqwest::Client,
    base_url: String,
    sender: SenderEmail,
    username: String,
    password: String,
}

/// A validated sender address.
#[derive(Clone)]
pub struct SenderEmail(String);

impl SenderEmail {
    pub fn parse(s: String) -> Result<Self, EmailError> {
        let email = is_valid_email(&s).map_err(|e| EmailError::InvalidRecipient(e.to_string()))?;
        Ok(Self(email))
    }

    pub fn inner(&self) -> &str {
        &self.0
    }
}

#[derive(Serialize)]
pub struct SendEmailRequest {
    to: String,
    from: String,
    #[serde(rename = "Html")]
    html: String,
    #[serde(rename = "Subject")]
    subject: String,
}

impl EmailClient {
    pub fn new(settings: &EmailSettings, http_client: reqwest::Client) -> Result<Self, EmailError> {
        let sender = SenderEmail::parse(settings.sender.clone())?;
        Ok(Self {
            http_client,
            base_url: settings.base_url(),
            sender,
            username: settings.username.clone(),
            password: settings.password.clone(),
        })
    }

    pub async fn send_email(
        &self,
        recipient: &str,
        subject: &str,
        html_content: &str,
    ) -> Result<(), EmailError> {
        let url = format!("{}/email", self.base_url);
        let request = SendEmailRequest {
            to: recipient.to_string(),
            from: self.sender.inner().to_string(),
            subject: subject.to_string(),
            html: html_content.to_string(),
        };

        self.http_client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send email: {}", e);
                EmailError::SendFailed(e.to_string())
            })?
            .error_for_status()
            .map_err(|e| {
                tracing::error!("Email service returned error: {}", e);
                EmailError::ServiceUnavailable(e.to_string())
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_parse_valid_email() {
        let sender = SenderEmail::parse("noreply@example.com".to_string());
        assert!(sender.is_ok());
    }

    #[test]
    fn sender_parse_invalid_email() {
        let sender = SenderEmail::parse("not-an-address".to_string());
        assert!(sender.is_err());
    }
}
