//! Delivery of finished drafts to the editor by email.

use crate::config::MailConfig;
use crate::error::MailError;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, instrument};

/// Anything that can hand a finished draft to the editor.
pub trait Notifier {
    async fn send(&self, subject: &str, html: &str) -> Result<(), MailError>;
}

impl<T: Notifier> Notifier for &T {
    async fn send(&self, subject: &str, html: &str) -> Result<(), MailError> {
        (**self).send(subject, html).await
    }
}

/// Wrap the draft in a body showing the copyable source first and the
/// rendered post below it.
pub fn compose_body(html: &str) -> String {
    format!(
        "<html><body>\
         <h3>HTML source (copy into the blog editor)</h3>\
         <pre style=\"white-space:pre-wrap; background:#f4f4f4; padding:12px; border:1px solid #ddd;\">{}</pre>\
         <hr>\
         <h3>Preview</h3>\
         <div>{}</div>\
         </body></html>",
        html_escape::encode_text(html),
        html
    )
}

/// Sends drafts over implicit-TLS SMTP with login credentials.
#[derive(Debug, Clone)]
pub struct EmailNotifier {
    config: MailConfig,
    subject_prefix: String,
}

impl EmailNotifier {
    pub fn new(config: MailConfig, subject_prefix: &str) -> Self {
        Self {
            config,
            subject_prefix: subject_prefix.to_string(),
        }
    }

    fn subject(&self, subject: &str) -> String {
        if self.subject_prefix.is_empty() {
            subject.to_string()
        } else {
            format!("{} {}", self.subject_prefix, subject)
        }
    }

    /// Build the full message without sending it.
    pub fn build_message(&self, subject: &str, html: &str) -> Result<Message, MailError> {
        let message = Message::builder()
            .from(self.config.from.parse()?)
            .to(self.config.to.parse()?)
            .subject(self.subject(subject))
            .header(ContentType::TEXT_HTML)
            .body(compose_body(html))?;
        Ok(message)
    }
}

impl Notifier for EmailNotifier {
    #[instrument(level = "info", skip_all, fields(to = %self.config.to, host = %self.config.smtp_host))]
    async fn send(&self, subject: &str, html: &str) -> Result<(), MailError> {
        if self.config.username.is_empty() || self.config.password.is_empty() {
            return Err(MailError::MissingCredentials);
        }
        let message = self.build_message(subject, html)?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)?
            .port(self.config.smtp_port)
            .credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ))
            .build();

        mailer.send(message).await?;
        info!(subject = %self.subject(subject), "Draft emailed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(user: &str, password: &str) -> MailConfig {
        MailConfig {
            smtp_host: "smtp.example.com".into(),
            smtp_port: 465,
            username: user.into(),
            password: password.into(),
            from: "editor@example.com".into(),
            to: "editor@example.com".into(),
        }
    }

    #[test]
    fn test_compose_body_has_escaped_source_and_live_preview() {
        let body = compose_body("<h2>Title & more</h2>");
        let source = body.find("&lt;h2&gt;Title &amp; more&lt;/h2&gt;").unwrap();
        let preview = body.find("<div><h2>Title & more</h2></div>").unwrap();
        assert!(source < preview);
        assert!(body.contains("<pre"));
    }

    #[test]
    fn test_message_has_prefixed_subject_and_html_type() {
        let notifier = EmailNotifier::new(config("u", "p"), "[spo draft]");
        let message = notifier.build_message("Tech & IT: A / B", "<p>x</p>").unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: [spo draft] Tech & IT: A / B"));
        assert!(raw.contains("Content-Type: text/html; charset=utf-8"));
        assert!(raw.contains("To: editor@example.com"));
    }

    #[test]
    fn test_bad_address_is_reported() {
        let mut cfg = config("u", "p");
        cfg.to = "not an address".into();
        let notifier = EmailNotifier::new(cfg, "");
        assert!(matches!(
            notifier.build_message("s", "b"),
            Err(MailError::Address(_))
        ));
    }

    #[tokio::test]
    async fn test_send_requires_credentials() {
        let notifier = EmailNotifier::new(config("editor@example.com", ""), "[spo draft]");
        assert!(matches!(
            notifier.send("s", "<p>x</p>").await,
            Err(MailError::MissingCredentials)
        ));
    }
}
