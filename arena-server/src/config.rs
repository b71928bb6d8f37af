use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub queue_timeout_seconds: u64,
    pub session_timeout_minutes: u64,
    pub connection_timeout_seconds: u64,
    /// Maximum level difference between paired opponents.
    pub level_tolerance: i32,
    /// Base URL of the question generation service, if any.
    pub generator_url: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("Invalid PORT"),
            queue_timeout_seconds: env::var("QUEUE_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .expect("Invalid QUEUE_TIMEOUT_SECONDS"),
            session_timeout_minutes: env::var("SESSION_TIMEOUT_MINUTES")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("Invalid SESSION_TIMEOUT_MINUTES"),
            connection_timeout_seconds: env::var("CONNECTION_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .expect("Invalid CONNECTION_TIMEOUT_SECONDS"),
            level_tolerance: env::var("LEVEL_TOLERANCE")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .expect("Invalid LEVEL_TOLERANCE"),
            generator_url: env::var("GENERATOR_URL").ok(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
