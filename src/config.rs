// src/config.rs

use std::env;
use std::str::FromStr;

use dotenvy::dotenv;

use crate::error::AppError;

/// Lifetime of an attendance QR token unless overridden.
pub const DEFAULT_ATTENDANCE_TOKEN_TTL_SECS: i64 = 60;

/// Largest study material upload accepted (10 MiB).
pub const MAX_MATERIAL_BYTES: usize = 10 * 1024 * 1024;

/// Process-wide configuration, built once in `main` and carried in `AppState`.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub attendance_token_ttl_secs: i64,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub razorpay_key_id: Option<String>,
    pub razorpay_key_secret: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_expiration: parsed_or("JWT_EXPIRATION", 7 * 24 * 3600)?,
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            port: parsed_or("PORT", 5000)?,
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173,http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            admin_email: optional("ADMIN_EMAIL"),
            admin_password: optional("ADMIN_PASSWORD"),
            attendance_token_ttl_secs: parsed_or(
                "ATTENDANCE_TOKEN_TTL_SECS",
                DEFAULT_ATTENDANCE_TOKEN_TTL_SECS,
            )?,
            gemini_api_key: optional("GEMINI_API_KEY"),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-1.5-flash".to_string()),
            razorpay_key_id: optional("RAZORPAY_KEY_ID"),
            razorpay_key_secret: optional("RAZORPAY_KEY_SECRET"),
        })
    }
}

fn required(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Config(format!("{} must be set", name)))
}

/// Unset and blank values are both treated as absent.
fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_or<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}
