//! Outbound e-mail interface.
//!
//! Actual delivery belongs to an external collaborator; this module builds
//! the verification and password-reset messages from SMTP config and the
//! public base URL, and records them as outbound. Swapping in a real
//! transport only touches [`Mailer::deliver`].

use crate::config::SmtpConfig;

pub struct OutboundMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Clone)]
pub struct Mailer {
    smtp: SmtpConfig,
    public_base_url: String,
}

impl Mailer {
    pub fn new(smtp: SmtpConfig, public_base_url: String) -> Self {
        Self {
            smtp,
            public_base_url,
        }
    }

    pub fn send_verification(&self, to: &str, token: &str) {
        let link = format!("{}/auth/verify?token={token}", self.public_base_url);
        self.deliver(OutboundMail {
            to: to.to_string(),
            subject: "Verify your Five Crowns account".to_string(),
            body: format!("Welcome! Confirm your e-mail address:\n\n{link}\n"),
        });
    }

    pub fn send_password_reset(&self, to: &str, token: &str) {
        let link = format!("{}/reset-password?token={token}", self.public_base_url);
        self.deliver(OutboundMail {
            to: to.to_string(),
            subject: "Reset your Five Crowns password".to_string(),
            body: format!("A password reset was requested for this address:\n\n{link}\n\nThe link expires in two hours.\n"),
        });
    }

    fn deliver(&self, mail: OutboundMail) {
        tracing::info!(
            smtp_host = %self.smtp.host,
            smtp_port = self.smtp.port,
            from = %self.smtp.from_address,
            to = %mail.to,
            subject = %mail.subject,
            "outbound mail queued"
        );
    }
}
