//! Walks through the main API surface: addresses, sending, listing, status.
//!
//! Run with `MAYLNG_API_KEY=... cargo run --example basic_usage`.

use chrono::{Duration, Utc};
use maylng::{
    Attachment, Client, CreateEmailAddress, Error, ListEmailAddresses, ListEmails, Recipient,
    SendRequest,
};
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

    let client = Client::from_env()?;

    let health = client.health_check().await?;
    println!("Health: {} ({})", health.status, health.message);

    let temp = client
        .create_email_address(
            &CreateEmailAddress::temporary(60)
                .prefix("agent-demo")
                .metadata("purpose", "demo")
                .metadata("agent_id", "demo-agent-001"),
        )
        .await?;
    println!("Created {} (expires {:?})", temp.email, temp.expires_at);

    let persistent = client
        .create_email_address(
            &CreateEmailAddress::persistent()
                .prefix("support-demo")
                .metadata("purpose", "customer-support"),
        )
        .await?;
    println!("Created {}", persistent.email);

    let simple = client
        .send_email(
            &SendRequest::new(&temp.id, "Welcome from Maylng!")
                .to(Recipient::new("demo@example.com").with_name("Demo User"))
                .text("Hello! This email was sent using the Maylng Rust client.")
                .html("<h2>Welcome from Maylng!</h2><p>Hello!</p>")
                .metadata("campaign", "demo"),
        )
        .await?;
    println!("Sent {}", simple.id);

    // "This is a demo file content", base64 encoded
    let with_attachment = client
        .send_email(
            &SendRequest::new(&persistent.id, "Email with Attachment")
                .to("demo@example.com")
                .text("Please find the attached file.")
                .attachment(Attachment::new(
                    "demo.txt",
                    "text/plain",
                    "VGhpcyBpcyBhIGRlbW8gZmlsZSBjb250ZW50",
                )),
        )
        .await?;
    println!("Sent with attachment {}", with_attachment.id);

    let scheduled_at = Utc::now() + Duration::minutes(5);
    let scheduled = client
        .send_email(
            &SendRequest::new(&temp.id, "Scheduled Email")
                .to("demo@example.com")
                .text("This email was scheduled five minutes ahead.")
                .scheduled_at(scheduled_at),
        )
        .await?;
    println!("Scheduled {} for {scheduled_at}", scheduled.id);

    let addresses = client
        .list_email_addresses(&ListEmailAddresses {
            page: Some(1),
            limit: Some(5),
            ..Default::default()
        })
        .await?;
    println!("{} addresses:", addresses.total);
    for address in &addresses.items {
        println!("  {} ({:?}) - {:?}", address.email, address.address_type, address.status);
    }

    let emails = client
        .list_emails(&ListEmails {
            limit: Some(3),
            since: Some(Utc::now() - Duration::days(7)),
            ..Default::default()
        })
        .await?;
    for email in &emails.items {
        println!("  \"{}\" - {:?} at {:?}", email.subject, email.status, email.sent_at);
    }

    let status = client.get_delivery_status(&simple.id).await?;
    println!("{}: {:?}, opens {}", status.email_id, status.status, status.opens);

    let account = client.get_account_info().await?;
    println!(
        "Plan {}: {}/{} addresses, {}/{} emails this month",
        account.plan,
        account.email_address_used,
        account.email_address_limit,
        account.emails_sent_this_month,
        account.email_limit_per_month
    );

    let extended = client.extend_email_address(&temp.id, 30).await?;
    println!("Extended to {:?}", extended.expires_at);

    Ok(())
}
