use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Where authentication and the data tables live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendMode {
    /// A hosted Supabase project.
    Supabase { url: String, anon_key: String },
    /// Process-local storage; everything is lost on restart.
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub backend: BackendMode,
    pub static_path: PathBuf,
    pub secure_cookies: bool,
    pub request_timeout: Duration,
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> AppResult<T> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("Invalid value for {}: {}", name, raw))),
        _ => Ok(default),
    }
}

fn required_var(name: &str) -> AppResult<String> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Config(format!("{} must be set", name)))
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let backend = match env::var("MONEYMIND_BACKEND")
            .unwrap_or_else(|_| "supabase".into())
            .trim()
        {
            "supabase" => BackendMode::Supabase {
                url: required_var("SUPABASE_URL")?,
                anon_key: required_var("SUPABASE_ANON_KEY")?,
            },
            "memory" => BackendMode::Memory,
            other => {
                return Err(AppError::Config(format!(
                    "MONEYMIND_BACKEND must be 'supabase' or 'memory', got '{}'",
                    other
                )))
            }
        };

        Ok(Self {
            host: env::var("MONEYMIND_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_var("MONEYMIND_PORT", 7070)?,
            backend,
            static_path: env::var("MONEYMIND_STATIC_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("static")),
            secure_cookies: parse_var("MONEYMIND_SECURE_COOKIES", false)?,
            request_timeout: Duration::from_secs(parse_var("MONEYMIND_REQUEST_TIMEOUT_SECS", 30)?),
        })
    }

    /// Settings for running against the in-memory backend.
    pub fn in_memory() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            backend: BackendMode::Memory,
            static_path: PathBuf::from("static"),
            secure_cookies: false,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
