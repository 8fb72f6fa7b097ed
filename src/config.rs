use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sender: String,
    pub sender_name: String,
}

/// Copy used in the confirmation emails, overridable per deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailContent {
    pub signup_subject: String,
    pub signup_content: String,
    pub signup_link_text: String,
    pub forget_pwd_subject: String,
    pub forget_pwd_content: String,
    pub forget_pwd_link_text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub token: TokenConfig,
    pub smtp: SmtpConfig,
    pub email: EmailContent,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let token = TokenConfig {
            secret: std::env::var("JWT_SECRET")?,
            ttl_minutes: std::env::var("TOKEN_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(10),
        };
        let smtp = SmtpConfig {
            host: std::env::var("SMTP_HOST")?,
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(587),
            username: std::env::var("SMTP_USERNAME")?,
            password: std::env::var("SMTP_PASSWORD")?,
            sender: std::env::var("SMTP_SENDER")?,
            sender_name: std::env::var("SMTP_SENDER_NAME")
                .unwrap_or_else(|_| "Accounts Service".into()),
        };
        let email = EmailContent {
            signup_subject: std::env::var("SIGNUP_EMAIL_SUBJECT")
                .unwrap_or_else(|_| "Confirm your email address".into()),
            signup_content: std::env::var("SIGNUP_EMAIL_CONTENT").unwrap_or_else(|_| {
                "Follow the link below to finish creating your account.".into()
            }),
            signup_link_text: std::env::var("SIGNUP_EMAIL_LINK_TEXT")
                .unwrap_or_else(|_| "Confirm email".into()),
            forget_pwd_subject: std::env::var("FORGET_PWD_EMAIL_SUBJECT")
                .unwrap_or_else(|_| "Reset your password".into()),
            forget_pwd_content: std::env::var("FORGET_PWD_EMAIL_CONTENT")
                .unwrap_or_else(|_| "Follow the link below to set a new password.".into()),
            forget_pwd_link_text: std::env::var("FORGET_PWD_LINK_TEXT")
                .unwrap_or_else(|_| "Reset password".into()),
        };
        Ok(Self {
            database_url,
            token,
            smtp,
            email,
        })
    }
}
