// Festival Scoreboard - Configuration
//
// Everything comes from the environment (optionally seeded by a `.env` file).
// Bad values fall back to their defaults with a warning instead of aborting.

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::upload::ImageHost;

pub const DEFAULT_ADMIN_EMAIL: &str = "admin@spa.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub upload_preset: String,
}

impl CloudinaryConfig {
    pub fn image_host(&self) -> ImageHost {
        ImageHost::cloudinary(&self.cloud_name, &self.upload_preset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `FESTIVAL_DB_PATH`
    pub db_path: PathBuf,
    /// `FESTIVAL_BIND_ADDR`
    pub bind_addr: String,
    /// `FESTIVAL_ADMIN_EMAILS`, comma separated
    pub admin_emails: Vec<String>,
    /// `FESTIVAL_CAROUSEL_SECS`
    pub carousel_interval: Duration,
    /// `FESTIVAL_POLL_MS`: how often to look for commits from other processes
    pub poll_interval: Duration,
    /// `FESTIVAL_LOG_FILE`: dashboard log target
    pub log_file: PathBuf,
    /// `CLOUDINARY_CLOUD_NAME` + `CLOUDINARY_UPLOAD_PRESET`; uploads are
    /// disabled unless both are set
    pub cloudinary: Option<CloudinaryConfig>,
}

impl Config {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| -> String {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let admin_emails: Vec<String> = text("FESTIVAL_ADMIN_EMAILS", DEFAULT_ADMIN_EMAIL)
            .split(',')
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty())
            .collect();

        let cloudinary = match (
            lookup("CLOUDINARY_CLOUD_NAME").filter(|v| !v.trim().is_empty()),
            lookup("CLOUDINARY_UPLOAD_PRESET").filter(|v| !v.trim().is_empty()),
        ) {
            (Some(cloud_name), Some(upload_preset)) => Some(CloudinaryConfig {
                cloud_name: cloud_name.trim().to_string(),
                upload_preset: upload_preset.trim().to_string(),
            }),
            _ => None,
        };

        Config {
            db_path: PathBuf::from(text("FESTIVAL_DB_PATH", "festival.db")),
            bind_addr: text("FESTIVAL_BIND_ADDR", "0.0.0.0:3000"),
            admin_emails,
            carousel_interval: Duration::from_secs(parse_or(
                "FESTIVAL_CAROUSEL_SECS",
                lookup("FESTIVAL_CAROUSEL_SECS"),
                5u64,
            )),
            poll_interval: Duration::from_millis(parse_or(
                "FESTIVAL_POLL_MS",
                lookup("FESTIVAL_POLL_MS"),
                1000u64,
            )),
            log_file: PathBuf::from(text("FESTIVAL_LOG_FILE", "festival-dashboard.log")),
            cloudinary,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + Display + PartialOrd + Copy + Default,
    T::Err: Display,
{
    let Some(raw) = raw else {
        return default;
    };

    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => value,
        Ok(value) => {
            warn!(key, %value, %default, "value must be positive, using default");
            default
        }
        Err(e) => {
            warn!(key, %raw, %e, %default, "invalid value, using default");
            default
        }
    }
}
