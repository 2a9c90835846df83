use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart, SinglePart, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use newswatch_common::{Error, Result};
use newswatch_config::EmailConfig;
use tracing::info;

/// Delivery seam for rendered reports. Failures are classified as
/// `Error::Delivery`; the caller decides how to surface them.
#[async_trait]
pub trait EmailGateway: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
        text_body: Option<&str>,
    ) -> Result<()>;
}

/// SMTP-backed gateway. STARTTLS on the submission port when `use_tls` is
/// set, implicit TLS otherwise.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &EmailConfig) -> Result<Self> {
        let from: Mailbox = config
            .from_address
            .parse()
            .map_err(|e| Error::Config(format!("invalid from address: {e}")))?;

        let credentials = Credentials::new(
            config.from_address.clone(),
            config.password.clone(),
        );

        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_server)
        }
        .map_err(|e| Error::Config(format!("invalid SMTP relay {}: {e}", config.smtp_server)))?;

        let transport = builder
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl EmailGateway for SmtpMailer {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
        text_body: Option<&str>,
    ) -> Result<()> {
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| Error::Delivery(format!("invalid recipient address: {e}")))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject);

        let message = match text_body {
            Some(text) => builder
                .multipart(MultiPart::alternative_plain_html(
                    text.to_string(),
                    html_body.to_string(),
                ))
                .map_err(|e| Error::Delivery(format!("failed to build message: {e}")))?,
            None => builder
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(html_body.to_string()),
                )
                .map_err(|e| Error::Delivery(format!("failed to build message: {e}")))?,
        };

        info!("sending report to {recipient}");
        self.transport
            .send(message)
            .await
            .map_err(|e| Error::Delivery(format!("smtp send failed: {e}")))?;

        info!("report sent to {recipient}");
        Ok(())
    }
}
