//! Request and response types for the Mayl API.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Free-form metadata attached to addresses and emails.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Lifetime policy of an email address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    /// Expires after a configured number of minutes.
    Temporary,
    /// Lives until deleted.
    Persistent,
}

/// Lifecycle state of an email address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressStatus {
    Active,
    Expired,
    Disabled,
    #[serde(other)]
    Unknown,
}

/// An email address owned by the account.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmailAddress {
    pub id: String,
    pub email: String,
    #[serde(rename = "type")]
    pub address_type: AddressType,
    #[serde(default)]
    pub prefix: Option<String>,
    pub status: AddressStatus,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// Parameters for creating an email address.
///
/// Start from [`CreateEmailAddress::temporary`] or
/// [`CreateEmailAddress::persistent`] and chain the optional settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateEmailAddress {
    #[serde(rename = "type")]
    pub address_type: AddressType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl CreateEmailAddress {
    /// A temporary address expiring after `expiration_minutes`.
    pub fn temporary(expiration_minutes: u32) -> Self {
        Self {
            address_type: AddressType::Temporary,
            prefix: None,
            domain: None,
            expiration_minutes: Some(expiration_minutes),
            metadata: None,
        }
    }

    /// A persistent address.
    pub fn persistent() -> Self {
        Self {
            address_type: AddressType::Persistent,
            prefix: None,
            domain: None,
            expiration_minutes: None,
            metadata: None,
        }
    }

    /// Request a specific local part prefix.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Request a custom domain.
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Add one metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata
            .get_or_insert_with(Metadata::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Changes to apply to an existing email address.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateEmailAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// A message recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Recipient {
    /// A recipient with no display name.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl From<&str> for Recipient {
    fn from(email: &str) -> Self {
        Self::new(email)
    }
}

/// A file attached to an outbound email.
///
/// `content` must already be base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub content: String,
}

impl Attachment {
    /// Build an attachment from already base64-encoded `content`.
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            content: content.into(),
        }
    }
}

/// One outbound email.
///
/// # Examples
/// ```
/// use maylng::{Recipient, SendRequest};
///
/// let request = SendRequest::new("addr_123", "Welcome!")
///     .to(Recipient::new("user@example.com").with_name("User"))
///     .text("Hello and welcome.")
///     .metadata("batch_id", "demo-batch-001");
/// assert_eq!(request.to.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendRequest {
    pub from_email_id: String,
    pub to: Vec<Recipient>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<Recipient>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<Recipient>,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl SendRequest {
    /// Create a request sent from the address with id `from_email_id`.
    pub fn new(from_email_id: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            from_email_id: from_email_id.into(),
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: subject.into(),
            text: None,
            html: None,
            attachments: Vec::new(),
            scheduled_at: None,
            metadata: Metadata::new(),
        }
    }

    /// Add a primary recipient.
    pub fn to(mut self, recipient: impl Into<Recipient>) -> Self {
        self.to.push(recipient.into());
        self
    }

    /// Add a carbon-copy recipient.
    pub fn cc(mut self, recipient: impl Into<Recipient>) -> Self {
        self.cc.push(recipient.into());
        self
    }

    /// Add a blind carbon-copy recipient.
    pub fn bcc(mut self, recipient: impl Into<Recipient>) -> Self {
        self.bcc.push(recipient.into());
        self
    }

    /// Set the plain-text body.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set the HTML body.
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Attach a file.
    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Ask the API to deliver at `at` instead of immediately.
    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    /// Add one metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Check the request locally before it is sent.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.from_email_id.trim().is_empty() {
            return Err(Error::validation("from_email_id", "sender address id is required"));
        }
        if self.to.is_empty() {
            return Err(Error::validation("to", "at least one recipient is required"));
        }
        for (field, recipients) in [("to", &self.to), ("cc", &self.cc), ("bcc", &self.bcc)] {
            if let Some(bad) = recipients.iter().find(|r| !r.email.contains('@')) {
                return Err(Error::validation(
                    field,
                    format!("invalid recipient address: {}", bad.email),
                ));
            }
        }
        if self.subject.trim().is_empty() {
            return Err(Error::validation("subject", "subject is required"));
        }
        if self.text.is_none() && self.html.is_none() {
            return Err(Error::validation("text", "a text or html body is required"));
        }
        Ok(())
    }
}

/// Delivery state of an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    Queued,
    Scheduled,
    Sent,
    Delivered,
    Bounced,
    Failed,
    #[serde(other)]
    Unknown,
}

/// An email accepted by the API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SentEmail {
    pub id: String,
    #[serde(default)]
    pub from_email_id: Option<String>,
    #[serde(default)]
    pub to: Vec<Recipient>,
    pub subject: String,
    pub status: EmailStatus,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// Tracking information for a sent email.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeliveryStatus {
    pub email_id: String,
    pub status: EmailStatus,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub opens: u32,
    #[serde(default)]
    pub clicks: u32,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    #[serde(default)]
    pub has_more: bool,
}

impl<T> Page<T> {
    /// The page number to request next, or `None` on the last page.
    pub fn next_page(&self) -> Option<u32> {
        let seen = u64::from(self.page) * u64::from(self.limit);
        if self.has_more || (self.limit > 0 && seen < self.total) {
            self.page.checked_add(1)
        } else {
            None
        }
    }
}

/// Query parameters for listing email addresses.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListEmailAddresses {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub address_type: Option<AddressType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AddressStatus>,
}

/// Query parameters for listing sent emails.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListEmails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EmailStatus>,
}

/// Usage and plan limits for the authenticated account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountInfo {
    pub account_id: String,
    pub plan: String,
    pub email_address_limit: u32,
    pub email_address_used: u32,
    pub email_limit_per_month: u32,
    pub emails_sent_this_month: u32,
}

/// Result of the API health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

impl HealthStatus {
    /// Returns `true` when the API reports itself healthy.
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_request() -> SendRequest {
        SendRequest::new("addr_1", "Hello")
            .to("user@example.com")
            .text("Hi")
    }

    #[test]
    fn test_send_request_skips_empty_fields() {
        let value = serde_json::to_value(valid_request()).unwrap();
        assert_eq!(
            value,
            json!({
                "from_email_id": "addr_1",
                "to": [{"email": "user@example.com"}],
                "subject": "Hello",
                "text": "Hi",
            })
        );
    }

    #[test]
    fn test_validate_accepts_complete_request() {
        assert!(valid_request().validate().is_ok());
        assert!(
            SendRequest::new("addr_1", "Hello")
                .to("user@example.com")
                .html("<p>Hi</p>")
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_validate_reports_field() {
        let cases = [
            (SendRequest::new("", "Hello").to("a@b.c").text("x"), "from_email_id"),
            (SendRequest::new("addr_1", "Hello").text("x"), "to"),
            (SendRequest::new("addr_1", "Hello").to("not-an-email").text("x"), "to"),
            (SendRequest::new("addr_1", "  ").to("a@b.c").text("x"), "subject"),
            (SendRequest::new("addr_1", "Hello").to("a@b.c"), "text"),
            (SendRequest::new("addr_1", "Hello").to("a@b.c").cc("nope").text("x"), "cc"),
            (SendRequest::new("addr_1", "Hello").to("a@b.c").bcc("nope").text("x"), "bcc"),
        ];
        for (request, expected) in cases {
            match request.validate() {
                Err(Error::Validation { field, .. }) => {
                    assert_eq!(field.as_deref(), Some(expected));
                }
                other => panic!("expected validation error for {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_create_temporary_address_body() {
        let body = CreateEmailAddress::temporary(60)
            .prefix("agent-demo")
            .metadata("purpose", "demo");
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({
                "type": "temporary",
                "prefix": "agent-demo",
                "expiration_minutes": 60,
                "metadata": {"purpose": "demo"},
            })
        );
    }

    #[test]
    fn test_unknown_status_is_tolerated() {
        let email: SentEmail = serde_json::from_value(json!({
            "id": "em_1",
            "subject": "Hi",
            "status": "deferred",
        }))
        .unwrap();
        assert_eq!(email.status, EmailStatus::Unknown);
        assert!(email.to.is_empty());
    }

    #[test]
    fn test_next_page() {
        let page = Page::<u8> {
            items: vec![1, 2],
            total: 5,
            page: 1,
            limit: 2,
            has_more: false,
        };
        assert_eq!(page.next_page(), Some(2));

        let last = Page::<u8> {
            items: vec![5],
            total: 5,
            page: 3,
            limit: 2,
            has_more: false,
        };
        assert_eq!(last.next_page(), None);
    }

    #[test]
    fn test_next_page_at_counter_limit() {
        let page = Page::<u8> {
            items: vec![],
            total: u64::MAX,
            page: u32::MAX,
            limit: 10,
            has_more: true,
        };
        assert_eq!(page.next_page(), None);
    }
}
