use std::env;

/// Process-wide configuration, read from the environment once at startup
/// and injected into the components that need it.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,

    /// Public base URL of the deployment; used for links and the
    /// tracking-pixel URL embedded in outgoing email.
    pub site_url: String,
    pub allowed_origins: Vec<String>,

    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub reset_token_ttl_hours: i64,

    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub smtp_use_tls: bool,
    pub default_from_email: String,

    // Bot-challenge verification. An empty secret disables the check.
    pub captcha_secret: String,
    pub captcha_verify_url: String,

    pub google_userinfo_url: String,

    pub argon_memory_kb: u32,
    pub argon_iterations: u32,
    pub argon_parallelism: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: env::var("DATABASE_URL")?,

            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT").unwrap_or_else(|_| "8080".to_string()).parse()?,

            site_url: env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string()),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),

            jwt_secret: env::var("JWT_SECRET")?,
            access_token_ttl_minutes: env::var("ACCESS_TOKEN_TTL_MINUTES")
                .unwrap_or_else(|_| "15".to_string())
                .parse()?,
            refresh_token_ttl_days: env::var("REFRESH_TOKEN_TTL_DAYS")
                .unwrap_or_else(|_| "14".to_string())
                .parse()?,
            reset_token_ttl_hours: env::var("RESET_TOKEN_TTL_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()?,

            smtp_host: env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string()),
            smtp_port: env::var("SMTP_PORT").unwrap_or_else(|_| "587".to_string()).parse()?,
            smtp_username: env::var("SMTP_USERNAME").unwrap_or_default(),
            smtp_password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            smtp_use_tls: env::var("SMTP_USE_TLS").unwrap_or_else(|_| "true".to_string()).parse()?,
            default_from_email: env::var("DEFAULT_FROM_EMAIL")
                .unwrap_or_else(|_| "no-reply@localhost".to_string()),

            captcha_secret: env::var("CAPTCHA_SECRET").unwrap_or_default(),
            captcha_verify_url: env::var("CAPTCHA_VERIFY_URL")
                .unwrap_or_else(|_| "https://www.google.com/recaptcha/api/siteverify".to_string()),

            google_userinfo_url: env::var("GOOGLE_USERINFO_URL")
                .unwrap_or_else(|_| "https://www.googleapis.com/oauth2/v3/userinfo".to_string()),

            argon_memory_kb: env::var("ARGON_MEMORY_KB").unwrap_or_else(|_| "65536".to_string()).parse()?,
            argon_iterations: env::var("ARGON_ITERATIONS").unwrap_or_else(|_| "3".to_string()).parse()?,
            argon_parallelism: env::var("ARGON_PARALLELISM").unwrap_or_else(|_| "1".to_string()).parse()?,
        })
    }
}
