//! Mayl async client implementation.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::dispatch::EmailService;
use crate::models::{
    AccountInfo, CreateEmailAddress, DeliveryStatus, EmailAddress, HealthStatus, ListEmailAddresses,
    ListEmails, Page, SendRequest, SentEmail, UpdateEmailAddress,
};
use crate::{Error, Result};

/// Async client for the Mayl transactional email API.
///
/// Use [`Client::new`] with an API key, [`Client::from_env`] to read
/// `MAYLNG_API_KEY`, or [`Client::builder`] for custom settings like the base
/// URL, timeout, or a proxy.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
    proxy: Option<String>,
}

impl Client {
    /// Create a builder for configuring the client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client for `api_key` with default settings.
    ///
    /// # Examples
    /// ```no_run
    /// # use maylng::Client;
    /// # fn main() -> Result<(), maylng::Error> {
    /// let client = Client::new("my-api-key")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        ClientBuilder::new().api_key(api_key).build()
    }

    /// Create a client configured from `MAYLNG_API_KEY` and, if set,
    /// `MAYLNG_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        ClientBuilder::from_env().build()
    }

    /// The API root every request is sent to.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Get the proxy URL if one was configured.
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    /// Check that the API is reachable and healthy.
    ///
    /// # Examples
    /// ```no_run
    /// # use maylng::Client;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), maylng::Error> {
    /// let client = Client::from_env()?;
    /// let health = client.health_check().await?;
    /// println!("{}: {}", health.status, health.message);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn health_check(&self) -> Result<HealthStatus> {
        self.execute(self.request(Method::GET, &["v1", "health"])?).await
    }

    /// Fetch plan limits and usage for the authenticated account.
    pub async fn get_account_info(&self) -> Result<AccountInfo> {
        self.execute(self.request(Method::GET, &["v1", "account"])?).await
    }

    /// Create a temporary or persistent email address.
    ///
    /// # Examples
    /// ```no_run
    /// # use maylng::{Client, CreateEmailAddress};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), maylng::Error> {
    /// let client = Client::from_env()?;
    /// let address = client
    ///     .create_email_address(
    ///         &CreateEmailAddress::temporary(60)
    ///             .prefix("agent-demo")
    ///             .metadata("purpose", "demo"),
    ///     )
    ///     .await?;
    /// println!("{} expires at {:?}", address.email, address.expires_at);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create_email_address(&self, params: &CreateEmailAddress) -> Result<EmailAddress> {
        self.execute(self.request(Method::POST, &["v1", "email-addresses"])?.json(params))
            .await
    }

    /// Fetch one email address by id.
    pub async fn get_email_address(&self, id: &str) -> Result<EmailAddress> {
        self.execute(self.request(Method::GET, &["v1", "email-addresses", id])?)
            .await
    }

    /// List email addresses, one page at a time.
    ///
    /// # Examples
    /// ```no_run
    /// # use maylng::{Client, ListEmailAddresses};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), maylng::Error> {
    /// let client = Client::from_env()?;
    /// let mut query = ListEmailAddresses { limit: Some(5), ..Default::default() };
    /// loop {
    ///     let page = client.list_email_addresses(&query).await?;
    ///     for address in &page.items {
    ///         println!("{} ({:?})", address.email, address.status);
    ///     }
    ///     match page.next_page() {
    ///         Some(next) => query.page = Some(next),
    ///         None => break,
    ///     }
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn list_email_addresses(
        &self,
        query: &ListEmailAddresses,
    ) -> Result<Page<EmailAddress>> {
        self.execute(self.request(Method::GET, &["v1", "email-addresses"])?.query(query))
            .await
    }

    /// Replace the metadata of an email address.
    pub async fn update_email_address(
        &self,
        id: &str,
        changes: &UpdateEmailAddress,
    ) -> Result<EmailAddress> {
        self.execute(self.request(Method::PATCH, &["v1", "email-addresses", id])?.json(changes))
            .await
    }

    /// Push back the expiration of a temporary address.
    ///
    /// # Arguments
    /// * `id` - The address id
    /// * `additional_minutes` - Minutes to add to the current expiration
    pub async fn extend_email_address(
        &self,
        id: &str,
        additional_minutes: u32,
    ) -> Result<EmailAddress> {
        let body = serde_json::json!({ "additional_minutes": additional_minutes });
        let request = self.request(Method::POST, &["v1", "email-addresses", id, "extend"])?;
        self.execute(request.json(&body))
            .await
    }

    /// Delete an email address.
    pub async fn delete_email_address(&self, id: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, &["v1", "email-addresses", id])?
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// Send (or schedule) one email.
    ///
    /// The request is validated locally first, so obviously malformed
    /// requests fail with [`Error::Validation`] without reaching the API.
    ///
    /// # Examples
    /// ```no_run
    /// # use maylng::{Client, Recipient, SendRequest};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), maylng::Error> {
    /// let client = Client::from_env()?;
    /// let request = SendRequest::new("addr_123", "Welcome from Maylng!")
    ///     .to(Recipient::new("demo@example.com").with_name("Demo User"))
    ///     .text("Hello!")
    ///     .metadata("campaign", "demo");
    /// let sent = client.send_email(&request).await?;
    /// println!("sent {}", sent.id);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn send_email(&self, request: &SendRequest) -> Result<SentEmail> {
        request.validate()?;
        debug!(
            from = %request.from_email_id,
            recipients = request.to.len(),
            scheduled = request.scheduled_at.is_some(),
            "sending email"
        );
        self.execute(self.request(Method::POST, &["v1", "emails"])?.json(request))
            .await
    }

    /// Fetch one sent email by id.
    pub async fn get_email(&self, id: &str) -> Result<SentEmail> {
        self.execute(self.request(Method::GET, &["v1", "emails", id])?)
            .await
    }

    /// List sent emails, one page at a time.
    pub async fn list_emails(&self, query: &ListEmails) -> Result<Page<SentEmail>> {
        self.execute(self.request(Method::GET, &["v1", "emails"])?.query(query))
            .await
    }

    /// Fetch delivery and engagement tracking for a sent email.
    pub async fn get_delivery_status(&self, id: &str) -> Result<DeliveryStatus> {
        self.execute(self.request(Method::GET, &["v1", "emails", id, "status"])?)
            .await
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        Ok(self.http.request(method, self.endpoint(segments)?))
    }

    /// Append `segments` to the base URL, percent-encoding each one.
    ///
    /// Empty, `.` and `..` segments are rejected since they would address a
    /// different resource.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| Error::InvalidBaseUrl(self.base_url.to_string()))?;
            path.pop_if_empty();
            for segment in segments {
                if matches!(*segment, "" | "." | "..") {
                    return Err(Error::validation(
                        "id",
                        format!("invalid resource id: {segment:?}"),
                    ));
                }
                path.push(segment);
            }
        }
        Ok(url)
    }

    /// Common request pattern: send, map error statuses, decode JSON.
    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = check_status(request.send().await?).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(Into::into)
    }
}

impl EmailService for Client {
    async fn send(&self, request: &SendRequest) -> Result<SentEmail> {
        self.send_email(request).await
    }
}

/// Error body returned by the API on non-success statuses.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    retry_after: Option<f64>,
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_retry_after(v, Utc::now()));
    let body = response.text().await.unwrap_or_default();

    Err(error_for_status(status, retry_after, &body))
}

/// Parse a `Retry-After` value, either delay-seconds or an HTTP-date.
///
/// Dates in the past yield a zero delay.
fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    Some((at.with_timezone(&Utc) - now).to_std().unwrap_or(Duration::ZERO))
}

/// Map a non-success status and its body to an [`Error`].
///
/// A `Retry-After` header takes precedence over a `retry_after` body field.
fn error_for_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> Error {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .or(parsed.error)
        .unwrap_or_else(|| match status.canonical_reason() {
            Some(reason) if body.trim().is_empty() => reason.to_string(),
            _ => body.chars().take(200).collect(),
        });

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Authentication(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Error::Validation {
            message,
            field: parsed.field,
        },
        StatusCode::TOO_MANY_REQUESTS => Error::RateLimited {
            message,
            retry_after: retry_after.or_else(|| {
                parsed
                    .retry_after
                    .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            }),
        },
        _ => Error::Api {
            status: status.as_u16(),
            message,
            request_id: parsed.request_id,
        },
    }
}

const BASE_URL: &str = "https://api.mayl.ng";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT_VALUE: &str = concat!("maylng-rust/", env!("CARGO_PKG_VERSION"));
const API_KEY_ENV: &str = "MAYLNG_API_KEY";
const BASE_URL_ENV: &str = "MAYLNG_BASE_URL";

/// Builder for configuring a Mayl client.
///
/// Start with [`Client::builder`] to override defaults.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
    proxy: Option<String>,
    danger_accept_invalid_certs: bool,
    user_agent: String,
}

impl ClientBuilder {
    /// Create a new builder with default settings.
    ///
    /// Defaults:
    /// - No API key (required before [`build`](Self::build))
    /// - Base URL `https://api.mayl.ng`
    /// - 30 second request timeout
    /// - No proxy
    /// - `danger_accept_invalid_certs = false`
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            proxy: None,
            danger_accept_invalid_certs: false,
            user_agent: USER_AGENT_VALUE.to_string(),
        }
    }

    /// A builder seeded from `MAYLNG_API_KEY` and `MAYLNG_BASE_URL`.
    ///
    /// Unset or empty variables leave the defaults in place.
    pub fn from_env() -> Self {
        let mut builder = Self::new();
        if let Some(key) = std::env::var(API_KEY_ENV).ok().filter(|v| !v.is_empty()) {
            builder = builder.api_key(key);
        }
        if let Some(url) = std::env::var(BASE_URL_ENV).ok().filter(|v| !v.is_empty()) {
            builder = builder.base_url(url);
        }
        builder
    }

    /// Set the API key sent as a bearer token.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Override the API root URL.
    ///
    /// Useful for testing or for a self-hosted gateway.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the per-request timeout (default: 30 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a proxy URL (e.g., "http://127.0.0.1:8080" or "socks5://...").
    ///
    /// This uses reqwest's proxy support for all requests.
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Control whether to accept invalid TLS certificates (default: false).
    pub fn danger_accept_invalid_certs(mut self, value: bool) -> Self {
        self.danger_accept_invalid_certs = value;
        self
    }

    /// Override the default user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the client.
    ///
    /// No network request is made here.
    ///
    /// # Errors
    /// [`Error::MissingApiKey`] if no key was set, [`Error::InvalidBaseUrl`]
    /// if the base URL cannot be parsed, [`Error::Authentication`] if the key
    /// cannot be sent as a header, or [`Error::Request`] if the proxy URL or
    /// TLS setup is rejected.
    pub fn build(self) -> Result<Client> {
        let api_key = self
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or(Error::MissingApiKey)?;

        let base_url = Url::parse(&self.base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| Error::InvalidBaseUrl(self.base_url.clone()))?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|_| Error::Authentication("API key contains invalid characters".into()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(self.user_agent)
            .timeout(self.timeout)
            .danger_accept_invalid_certs(self.danger_accept_invalid_certs);

        if let Some(proxy_url) = &self.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }

        Ok(Client {
            http: builder.build()?,
            base_url,
            proxy: self.proxy,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_build_requires_api_key() {
        assert!(matches!(Client::builder().build(), Err(Error::MissingApiKey)));
        assert!(matches!(
            Client::builder().api_key("   ").build(),
            Err(Error::MissingApiKey)
        ));
    }

    fn client(base_url: &str) -> Client {
        Client::builder().api_key("key").base_url(base_url).build().unwrap()
    }

    #[test]
    fn test_endpoint_joins_base_path() {
        let client = client("http://localhost:8080/");
        assert_eq!(client.proxy(), None);
        assert_eq!(
            client.endpoint(&["v1", "emails"]).unwrap().as_str(),
            "http://localhost:8080/v1/emails"
        );

        let client = self::client("https://gateway.example.com/mayl/");
        assert_eq!(
            client.endpoint(&["v1", "account"]).unwrap().as_str(),
            "https://gateway.example.com/mayl/v1/account"
        );
    }

    #[test]
    fn test_endpoint_escapes_ids() {
        let client = client("http://localhost:8080");
        let url = client
            .endpoint(&["v1", "emails", "em_1/status/..?x=1#f", "status"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/v1/emails/em_1%2Fstatus%2F..%3Fx=1%23f/status"
        );
        assert_eq!(url.query(), None);
        assert_eq!(url.path_segments().unwrap().count(), 4);
    }

    #[test]
    fn test_endpoint_rejects_dot_ids() {
        let client = client("http://localhost:8080");
        for id in ["", ".", ".."] {
            match client.endpoint(&["v1", "emails", id]) {
                Err(Error::Validation { field, .. }) => assert_eq!(field.as_deref(), Some("id")),
                other => panic!("expected validation error for {id:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        for base in ["not a url", "mailto:ops@example.com"] {
            let result = Client::builder().api_key("key").base_url(base).build();
            assert!(matches!(result, Err(Error::InvalidBaseUrl(_))), "{base}");
        }
    }

    #[test]
    fn test_retry_after_forms() {
        let now = DateTime::parse_from_rfc3339("2026-10-19T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(parse_retry_after(" 2 ", now), Some(Duration::from_secs(2)));
        assert_eq!(
            parse_retry_after("Mon, 19 Oct 2026 12:00:30 GMT", now),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            parse_retry_after("Mon, 19 Oct 2026 11:59:00 GMT", now),
            Some(Duration::ZERO)
        );
        assert_eq!(parse_retry_after("soon", now), None);
    }

    #[test]
    fn test_invalid_header_key_rejected() {
        let result = Client::new("bad\nkey");
        assert!(matches!(result, Err(Error::Authentication(_))));
    }

    #[test]
    fn test_rate_limit_header_wins_over_body() {
        let err = error_for_status(
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(2)),
            r#"{"message":"slow down","retry_after":10}"#,
        );
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(err.kind(), ErrorKind::RateLimited);
    }

    #[test]
    fn test_rate_limit_body_hint() {
        let err = error_for_status(
            StatusCode::TOO_MANY_REQUESTS,
            None,
            r#"{"message":"slow down","retry_after":1.5}"#,
        );
        assert_eq!(err.retry_after(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_validation_field_is_kept() {
        let err = error_for_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            None,
            r#"{"message":"invalid recipient","field":"to"}"#,
        );
        match err {
            Error::Validation { message, field } => {
                assert_eq!(message, "invalid recipient");
                assert_eq!(field.as_deref(), Some("to"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_json_body_falls_back() {
        let err = error_for_status(StatusCode::BAD_GATEWAY, None, "");
        match err {
            Error::Api { status, message, request_id } => {
                assert_eq!(status, 502);
                assert_eq!(message, "Bad Gateway");
                assert_eq!(request_id, None);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = error_for_status(StatusCode::UNAUTHORIZED, None, "invalid key");
        assert!(matches!(err, Error::Authentication(ref m) if m == "invalid key"));
    }
}
