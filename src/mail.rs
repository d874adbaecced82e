//! Outgoing mail. Delivery is somebody else's job: the service only hands a
//! rendered message to a [`Mailer`] and never waits on the outcome.

use tracing::{debug, info};

use crate::config::MailConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub trait Mailer: Send + Sync {
    fn send(&self, message: Email);
}

/// Messages the account flows send.
#[derive(Debug, Clone)]
pub enum Template<'a> {
    Confirm { username: &'a str, link: String },
    ResetPassword { username: &'a str, link: String },
}

impl Template<'_> {
    fn subject(&self) -> &'static str {
        match self {
            Template::Confirm { .. } => "Confirm Your Account",
            Template::ResetPassword { .. } => "Reset Your Password",
        }
    }

    fn body(&self) -> String {
        match self {
            Template::Confirm { username, link } => format!(
                "Dear {username},\n\n\
                 Welcome! To confirm your account please open the following link:\n\n\
                 {link}\n\n\
                 The link expires in one hour.\n"
            ),
            Template::ResetPassword { username, link } => format!(
                "Dear {username},\n\n\
                 To reset your password open the following link:\n\n\
                 {link}\n\n\
                 If you have not requested a password reset simply ignore this message.\n"
            ),
        }
    }
}

pub fn compose(cfg: &MailConfig, to: &str, template: Template<'_>) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("{} {}", cfg.subject_prefix, template.subject()),
        body: template.body(),
    }
}

/// Writes outgoing mail to the log instead of a transport.
pub struct LogMailer {
    sender: String,
}

impl LogMailer {
    pub fn new(cfg: &MailConfig) -> Self {
        Self {
            sender: cfg.sender.clone(),
        }
    }
}

impl Mailer for LogMailer {
    fn send(&self, message: Email) {
        info!(from = %self.sender, to = %message.to, subject = %message.subject, "mail queued");
        debug!(body = %message.body, "mail body");
    }
}
