//! # Maylng
//! Asynchronous client for the Mayl transactional email API: create temporary or persistent addresses, send and schedule emails, page through results, and check delivery status with [`Client`] and [`ClientBuilder`].
//!
//! ## Batch sending
//! [`Dispatcher`] sends many emails in bounded batches. Requests inside a batch run concurrently, each one gets its own [`DispatchOutcome`], and rate-limit responses pause the dispatch for the server's retry hint before it continues. Anything implementing [`EmailService`] can be dispatched to, which keeps the batching logic testable without a network.
//!
//! ## Runtime requirements
//! Async-only; run inside a Tokio (v1) runtime. HTTP calls use `reqwest`.
//!
//! ## Out of scope
//! The client makes exactly one HTTP request per call and never retries on its own; [`Dispatcher`] reports failures and leaves re-queuing to you. Templating and base64 encoding of attachments are up to the caller.
//!
//! ## Errors
//! Transport failures surface as [`Error::Request`]. Non-2xx statuses are mapped to [`Error::Authentication`], [`Error::Validation`], [`Error::RateLimited`] (with the server's retry hint), or [`Error::Api`]. [`Error::kind`] folds these into the [`ErrorKind`] buckets used by dispatch outcomes.
//!
//! ## Example
//! ```no_run
//! use maylng::{Client, CreateEmailAddress, SendRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), maylng::Error> {
//!     let client = Client::from_env()?;
//!     let address = client
//!         .create_email_address(&CreateEmailAddress::temporary(60).prefix("agent-demo"))
//!         .await?;
//!     println!("Created: {}", address.email);
//!
//!     let sent = client
//!         .send_email(
//!             &SendRequest::new(&address.id, "Welcome from Maylng!")
//!                 .to("demo@example.com")
//!                 .text("Hello!"),
//!         )
//!         .await?;
//!
//!     let status = client.get_delivery_status(&sent.id).await?;
//!     println!("{}: {:?}", sent.id, status.status);
//!     Ok(())
//! }
//! ```

mod client;
mod dispatch;
mod error;
mod models;

pub use client::{Client, ClientBuilder};
pub use dispatch::{DispatchConfig, DispatchOutcome, Dispatcher, EmailService, ErrorInfo};
pub use error::{Error, ErrorKind};
pub use models::{
    AccountInfo, AddressStatus, AddressType, Attachment, CreateEmailAddress, DeliveryStatus,
    EmailAddress, EmailStatus, HealthStatus, ListEmailAddresses, ListEmails, Metadata, Page,
    Recipient, SendRequest, SentEmail, UpdateEmailAddress,
};

/// Result type alias for Mayl operations.
///
/// This is equivalent to `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
