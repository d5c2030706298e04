//! Templated email dispatch with delivery logging.
//!
//! The dispatcher renders a flow's template, derives the text alternative,
//! sends one multipart message to all recipients, and (when tracking is
//! on) writes one delivery-log row per recipient. Failures are values:
//! callers that treat mail as best-effort log the error and move on.

use async_trait::async_trait;
use chrono::Utc;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::repos::email_log_repo::{self, EmailStatus};

use super::flows::EmailFlow;
use super::template::{self, TemplateError};

#[derive(Debug, Error)]
pub enum SendError {
    #[error("no recipients")]
    NoRecipients,
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("invalid address: {0}")]
    Address(String),
    #[error("message build error: {0}")]
    Build(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Seam between the dispatcher and the wire. Production uses SMTP; tests
/// substitute recording or failing transports.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, message: Message) -> Result<(), SendError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let mut builder = if cfg.smtp_use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&cfg.smtp_host)
        };
        builder = builder.port(cfg.smtp_port);
        if !cfg.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                cfg.smtp_username.clone(),
                cfg.smtp_password.clone(),
            ));
        }
        Ok(Self { transport: builder.build() })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn deliver(&self, message: Message) -> Result<(), SendError> {
        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| SendError::Transport(e.to_string()))
    }
}

/// Build the final template context: flow payload plus tracking fields and
/// the human-readable send timestamp. Pure; the caller's payload is not
/// touched.
pub fn build_context(
    flow: &EmailFlow,
    site_url: &str,
    token: Option<Uuid>,
) -> BTreeMap<String, String> {
    let mut ctx = flow.context();
    if let Some(token) = token {
        ctx.insert(
            "tracking_pixel".to_string(),
            format!(r#"<img src="{site_url}/email/track/{token}.png" />"#),
        );
        ctx.insert("email_id".to_string(), token.to_string());
    }
    ctx.insert(
        "timestamp".to_string(),
        Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    ctx
}

pub struct EmailDispatcher {
    db: PgPool,
    transport: Arc<dyn MailTransport>,
    from_email: String,
    site_url: String,
}

impl EmailDispatcher {
    pub fn new(
        db: PgPool,
        transport: Arc<dyn MailTransport>,
        from_email: String,
        site_url: String,
    ) -> Self {
        Self { db, transport, from_email, site_url }
    }

    /// Send `flow` to `recipients` in one message.
    ///
    /// With `track` on, one token is minted per invocation and one log row
    /// is written per recipient on success (all sharing the token), or a
    /// single `failed` row for the first recipient on error. Returns the
    /// token when tracking was requested.
    pub async fn send(
        &self,
        flow: &EmailFlow,
        recipients: &[String],
        from: Option<&str>,
        track: bool,
    ) -> Result<Option<Uuid>, SendError> {
        if recipients.is_empty() {
            return Err(SendError::NoRecipients);
        }

        let token = track.then(Uuid::new_v4);
        let context = build_context(flow, &self.site_url, token);

        match self.build_and_deliver(flow, &context, recipients, from).await {
            Ok(()) => {
                if let Some(token) = token {
                    for recipient in recipients {
                        email_log_repo::insert(
                            &self.db,
                            token,
                            recipient,
                            &flow.subject(),
                            flow.template_name(),
                            EmailStatus::Sent,
                            None,
                        )
                        .await?;
                    }
                }
                tracing::info!(
                    template = flow.template_name(),
                    recipients = recipients.len(),
                    "email sent"
                );
                Ok(token)
            }
            Err(e) => {
                if let Some(token) = token {
                    if let Err(log_err) = email_log_repo::insert(
                        &self.db,
                        token,
                        &recipients[0],
                        &flow.subject(),
                        flow.template_name(),
                        EmailStatus::Failed,
                        Some(&e.to_string()),
                    )
                    .await
                    {
                        tracing::error!(error = %log_err, "could not record email failure");
                    }
                }
                tracing::warn!(
                    template = flow.template_name(),
                    error = %e,
                    "email send failed"
                );
                Err(e)
            }
        }
    }

    async fn build_and_deliver(
        &self,
        flow: &EmailFlow,
        context: &BTreeMap<String, String>,
        recipients: &[String],
        from: Option<&str>,
    ) -> Result<(), SendError> {
        let html = template::render(flow.template_name(), context)?;
        let text = template::strip_tags(&html);

        let from_addr: Mailbox = from
            .unwrap_or(&self.from_email)
            .parse()
            .map_err(|e: lettre::address::AddressError| SendError::Address(e.to_string()))?;

        let mut builder = Message::builder().from(from_addr).subject(flow.subject());
        for recipient in recipients {
            let to: Mailbox = recipient
                .parse()
                .map_err(|e: lettre::address::AddressError| SendError::Address(e.to_string()))?;
            builder = builder.to(to);
        }

        let message = builder
            .multipart(MultiPart::alternative_plain_html(text, html))
            .map_err(|e| SendError::Build(e.to_string()))?;

        self.transport.deliver(message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::template::render;

    #[test]
    fn tracked_context_embeds_the_token_exactly_once() {
        let flow = EmailFlow::Welcome {
            first_name: "Amara".to_string(),
            portal_link: "https://hub.example.org/dashboard/".to_string(),
        };
        let token = Uuid::new_v4();
        let ctx = build_context(&flow, "https://hub.example.org", Some(token));

        let html = render(flow.template_name(), &ctx).unwrap();
        assert_eq!(html.matches(&token.to_string()).count(), 1);
        assert!(html.contains(&format!("/email/track/{token}.png")));
    }

    #[test]
    fn untracked_context_has_no_pixel() {
        let flow = EmailFlow::Generic {
            subject: "s".to_string(),
            body: "b".to_string(),
        };
        let ctx = build_context(&flow, "https://hub.example.org", None);
        assert!(!ctx.contains_key("tracking_pixel"));
        assert!(!ctx.contains_key("email_id"));
        assert!(ctx.contains_key("timestamp"));
    }

    #[test]
    fn caller_payload_is_not_mutated() {
        let flow = EmailFlow::Generic {
            subject: "s".to_string(),
            body: "b".to_string(),
        };
        let before = flow.context();
        let _ = build_context(&flow, "https://hub.example.org", Some(Uuid::new_v4()));
        assert_eq!(flow.context(), before);
    }
}
