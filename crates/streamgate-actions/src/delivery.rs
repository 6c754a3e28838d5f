//! Async delivery workers for queued outbound messages.
//!
//! Each transport retries up to three times with exponential backoff
//! before giving up; a failed message is logged and dropped, never
//! retried across worker restarts.

use anyhow::Result;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio::sync::mpsc;

use crate::outbox::OutboundMessage;

const MAX_ATTEMPTS: u32 = 3;

async fn backoff(attempt: u32) {
    tokio::time::sleep(std::time::Duration::from_millis(100 * 2u64.pow(attempt))).await;
}

/// One concrete way of pushing a message out of the system.
#[async_trait]
pub trait OutboundTransport: Send + Sync {
    async fn deliver(&self, message: &OutboundMessage) -> Result<()>;

    fn transport_name(&self) -> &str;
}

// ---- email (SMTP) ----

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

pub struct EmailTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl EmailTransport {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?.port(config.port);
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(Self {
            transport: builder.build(),
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl OutboundTransport for EmailTransport {
    async fn deliver(&self, message: &OutboundMessage) -> Result<()> {
        let OutboundMessage::Email {
            id,
            recipients,
            subject,
            body,
        } = message
        else {
            anyhow::bail!("email transport received a non-email message");
        };

        for recipient in recipients {
            let email = Message::builder()
                .from(self.from.parse()?)
                .to(recipient.parse()?)
                .subject(subject)
                .header(ContentType::TEXT_PLAIN)
                .body(body.clone())?;

            let mut last_err = None;
            for attempt in 0..MAX_ATTEMPTS {
                match self.transport.send(email.clone()).await {
                    Ok(_) => {
                        last_err = None;
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(
                            message = %id,
                            recipient = %recipient,
                            attempt = attempt + 1,
                            error = %e,
                            "Email send failed, retrying"
                        );
                        last_err = Some(e);
                        if attempt + 1 < MAX_ATTEMPTS {
                            backoff(attempt).await;
                        }
                    }
                }
            }
            if let Some(e) = last_err {
                return Err(e.into());
            }
        }
        Ok(())
    }

    fn transport_name(&self) -> &str {
        "email"
    }
}

// ---- slack (incoming webhook) ----

pub struct SlackTransport {
    client: reqwest::Client,
}

impl SlackTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for SlackTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutboundTransport for SlackTransport {
    async fn deliver(&self, message: &OutboundMessage) -> Result<()> {
        let OutboundMessage::Slack {
            id,
            webhook_url,
            text,
        } = message
        else {
            anyhow::bail!("slack transport received a non-slack message");
        };

        let payload = serde_json::json!({ "text": text });
        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            match self.client.post(webhook_url).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => {
                    last_err = Some(anyhow::anyhow!("slack returned {}", resp.status()));
                }
                Err(e) => last_err = Some(e.into()),
            }
            tracing::warn!(message = %id, attempt = attempt + 1, "Slack post failed, retrying");
            if attempt + 1 < MAX_ATTEMPTS {
                backoff(attempt).await;
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("slack post failed")))
    }

    fn transport_name(&self) -> &str {
        "slack"
    }
}

// ---- SMS gateway ----

#[derive(Debug, Clone)]
pub struct SmsGatewayConfig {
    /// POST endpoint accepting `{"to", "from", "body"}` JSON.
    pub url: String,
    pub from: String,
}

pub struct SmsTransport {
    client: reqwest::Client,
    config: SmsGatewayConfig,
}

impl SmsTransport {
    pub fn new(config: SmsGatewayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl OutboundTransport for SmsTransport {
    async fn deliver(&self, message: &OutboundMessage) -> Result<()> {
        let OutboundMessage::Sms { id, number, body } = message else {
            anyhow::bail!("sms transport received a non-sms message");
        };

        let payload = serde_json::json!({
            "to": number,
            "from": self.config.from,
            "body": body,
        });
        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            match self
                .client
                .post(&self.config.url)
                .json(&payload)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => {
                    last_err = Some(anyhow::anyhow!("sms gateway returned {}", resp.status()));
                }
                Err(e) => last_err = Some(e.into()),
            }
            tracing::warn!(message = %id, attempt = attempt + 1, "SMS post failed, retrying");
            if attempt + 1 < MAX_ATTEMPTS {
                backoff(attempt).await;
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("sms post failed")))
    }

    fn transport_name(&self) -> &str {
        "sms"
    }
}

// ---- worker ----

/// Drains the outbox, routing each message to its transport. Messages
/// with no configured transport are dropped with a warning.
pub struct DeliveryWorker {
    email: Option<EmailTransport>,
    slack: SlackTransport,
    sms: Option<SmsTransport>,
}

impl DeliveryWorker {
    pub fn new(email: Option<EmailTransport>, sms: Option<SmsTransport>) -> Self {
        Self {
            email,
            slack: SlackTransport::new(),
            sms,
        }
    }

    pub async fn run(self, mut rx: mpsc::Receiver<OutboundMessage>) {
        while let Some(message) = rx.recv().await {
            self.deliver(&message).await;
        }
        tracing::info!("Outbound queue closed, delivery worker exiting");
    }

    async fn deliver(&self, message: &OutboundMessage) {
        let transport: Option<&dyn OutboundTransport> = match message {
            OutboundMessage::Email { .. } => self.email.as_ref().map(|t| t as _),
            OutboundMessage::Sms { .. } => self.sms.as_ref().map(|t| t as _),
            OutboundMessage::Slack { .. } => Some(&self.slack),
        };
        let Some(transport) = transport else {
            tracing::warn!(message = %message.id(), "No transport configured, dropping message");
            return;
        };
        match transport.deliver(message).await {
            Ok(()) => {
                tracing::info!(
                    message = %message.id(),
                    transport = transport.transport_name(),
                    "Delivered outbound message"
                );
            }
            Err(e) => {
                tracing::error!(
                    message = %message.id(),
                    transport = transport.transport_name(),
                    error = %e,
                    "Delivery failed, dropping message"
                );
            }
        }
    }
}
