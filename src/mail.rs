use async_trait::async_trait;

/// A rendered message, ready for whatever transport sits behind [`Mailer`].
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutboundEmail) -> anyhow::Result<()>;
}

/// Development transport: writes the message to the log instead of
/// delivering it. Real delivery plugs in behind the same trait.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutboundEmail) -> anyhow::Result<()> {
        tracing::info!(to = %email.to, subject = %email.subject, "outbound email (log transport)");
        tracing::debug!(body = %email.body, "outbound email body");
        Ok(())
    }
}

pub fn password_reset_email(to: &str, name: &str, reset_url: &str) -> OutboundEmail {
    OutboundEmail {
        to: to.to_string(),
        subject: "Shopfront Password Recovery".to_string(),
        body: format!(
            "Hello {name},\n\n\
             You requested a password reset. Follow the link below within \
             30 minutes to choose a new password:\n\n{reset_url}\n\n\
             If you did not request this, you can ignore this email.\n",
        ),
    }
}
