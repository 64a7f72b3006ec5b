//! Sends a welcome email to several recipients in rate-limit-aware batches.
//!
//! Run with `MAYLNG_API_KEY=... cargo run --example batch_send`.
//! Ctrl-C stops the dispatch between batches.

use std::time::Duration;

use maylng::{
    Client, CreateEmailAddress, DispatchConfig, DispatchOutcome, Dispatcher, Error, ErrorKind,
    Recipient, SendRequest,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "maylng=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let client = Client::builder()
        .api_key(std::env::var("MAYLNG_API_KEY").unwrap_or_default())
        .timeout(Duration::from_secs(60))
        .build()?;

    let sender = client
        .create_email_address(
            &CreateEmailAddress::temporary(120)
                .prefix("newsletter")
                .metadata("department", "marketing"),
        )
        .await?;

    let requests: Vec<SendRequest> = (1..=5)
        .map(|i| {
            let name = format!("User {i}");
            SendRequest::new(&sender.id, format!("Welcome {name}!"))
                .to(Recipient::new(format!("user{i}@example.com")).with_name(&name))
                .text(format!("Hello {name},\n\nWelcome to our service!"))
                .metadata("batch_id", "demo-batch-001")
                .metadata("recipient_index", i)
        })
        .collect();

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let dispatcher = Dispatcher::new(DispatchConfig::default().batch_size(3));
    let outcomes = dispatcher
        .dispatch_until_cancelled(&client, &requests, &cancel)
        .await?;

    let mut retry = Vec::new();
    for (request, outcome) in requests.iter().zip(&outcomes) {
        match outcome {
            DispatchOutcome::Success(sent) => println!("sent {} ({})", sent.subject, sent.id),
            DispatchOutcome::Failure(info) => {
                println!("failed {}: {}", request.subject, info.message);
                if matches!(info.kind, ErrorKind::RateLimited | ErrorKind::Transient) {
                    retry.push(request.clone());
                }
            }
        }
    }
    println!("{} requests worth retrying later", retry.len());

    Ok(())
}
