use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Settings for confirm/reset links sent by mail.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub ttl_secs: u64,
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub subject_prefix: String,
    pub sender: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub tokens: TokenConfig,
    pub mail: MailConfig,
    /// Lower-cased addresses that register straight into the Administrator role.
    pub admin_emails: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok();
        let secret = std::env::var("SECRET_KEY")?;
        let jwt = JwtConfig {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "scribe".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "scribe-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
        };
        let tokens = TokenConfig {
            ttl_secs: std::env::var("TOKEN_TTL_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(3600),
            public_url: std::env::var("PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:8080".into())
                .trim_end_matches('/')
                .to_string(),
        };
        let mail = MailConfig {
            subject_prefix: std::env::var("MAIL_SUBJECT_PREFIX").unwrap_or_else(|_| "[Scribe]".into()),
            sender: std::env::var("MAIL_SENDER")
                .unwrap_or_else(|_| "Scribe Admin <noreply@scribe.local>".into()),
        };
        let admin_emails = parse_admin_emails(&std::env::var("ADMIN_EMAILS").unwrap_or_default());
        Ok(Self {
            database_url,
            jwt,
            tokens,
            mail,
            admin_emails,
        })
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|a| *a == email)
    }
}

fn parse_admin_emails(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
