//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::auth::{DEFAULT_REFRESH_THRESHOLD_SECS, DEFAULT_VALIDITY_WINDOW_SECS, TokenPolicy};
use crate::clock::SystemClock;
use crate::db::Database;
use crate::jwt::parse_algorithm;
use chrono::TimeDelta;
use clap::Parser;
use jsonwebtoken::Algorithm;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Environment variable holding the signing secret.
pub const JWT_KEY_ENV: &str = "JWT_KEY";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tokenwarden",
    about = "Access groups and self-refreshing session tokens"
)]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "APP_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "APP_PORT", default_value = "5001")]
    pub port: u16,

    /// Path to SQLite database file (":memory:" for a throwaway database)
    #[arg(short, long, env = "DATABASE_PATH", default_value = "tokenwarden.db")]
    pub database: String,

    /// Path to file containing the signing secret. Prefer the JWT_KEY env var instead
    #[arg(long)]
    pub jwt_key_file: Option<String>,

    /// Token signing algorithm (HS256, HS384 or HS512)
    #[arg(long, env = "JWT_ALGORITHM", default_value = "HS256", value_parser = validate_algorithm)]
    pub jwt_algorithm: Algorithm,

    /// Seconds a new token stays valid
    #[arg(long, env = "JWT_VALID_TIME", default_value_t = DEFAULT_VALIDITY_WINDOW_SECS,
        value_parser = clap::value_parser!(u32).range(1..))]
    pub jwt_valid_time: u32,

    /// Seconds before expiry in which using a token extends it
    #[arg(long, env = "JWT_REFRESH_THRESHOLD", default_value_t = DEFAULT_REFRESH_THRESHOLD_SECS,
        value_parser = clap::value_parser!(u32).range(1..))]
    pub jwt_refresh_threshold: u32,

    /// Also check token signatures cryptographically on verification
    #[arg(long, env = "JWT_VERIFY_SIGNATURE")]
    pub verify_signature: bool,

    /// Log output format
    #[arg(short, long, env = "LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,
}

fn validate_algorithm(s: &str) -> Result<Algorithm, String> {
    parse_algorithm(s).map_err(|e| e.to_string())
}

/// Initialize logging based on the specified format. `RUST_LOG` overrides the
/// default `info` level.
pub fn init_logging(format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

/// Load the signing secret from the environment or a file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_key_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(JWT_KEY_ENV) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(JWT_KEY_ENV) };
        secret
    } else if let Some(path) = jwt_key_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT key file");
                return None;
            }
        }
    } else {
        error!(
            "JWT key is required. Set JWT_KEY environment variable (recommended) or use --jwt-key-file"
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT key is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Token settings from validated arguments.
pub fn token_policy(args: &Args) -> TokenPolicy {
    TokenPolicy {
        validity_window: TimeDelta::seconds(i64::from(args.jwt_valid_time)),
        refresh_threshold: TimeDelta::seconds(i64::from(args.jwt_refresh_threshold)),
        verify_signature: args.verify_signature,
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, jwt_secret: String) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        jwt_algorithm: args.jwt_algorithm,
        token_policy: token_policy(args),
        clock: Arc::new(SystemClock),
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["tokenwarden"]).unwrap();
        assert_eq!(args.port, 5001);
        assert_eq!(args.jwt_algorithm, Algorithm::HS256);

        let policy = token_policy(&args);
        assert_eq!(policy.validity_window, TimeDelta::seconds(120));
        assert_eq!(policy.refresh_threshold, TimeDelta::seconds(60));
        assert!(!policy.verify_signature);
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "tokenwarden",
            "--jwt-algorithm",
            "HS512",
            "--jwt-valid-time",
            "300",
            "--jwt-refresh-threshold",
            "30",
            "--verify-signature",
        ])
        .unwrap();

        assert_eq!(args.jwt_algorithm, Algorithm::HS512);
        let policy = token_policy(&args);
        assert_eq!(policy.validity_window, TimeDelta::seconds(300));
        assert_eq!(policy.refresh_threshold, TimeDelta::seconds(30));
        assert!(policy.verify_signature);
    }

    #[test]
    fn test_rejects_asymmetric_algorithm() {
        assert!(Args::try_parse_from(["tokenwarden", "--jwt-algorithm", "RS256"]).is_err());
    }

    #[test]
    fn test_rejects_zero_durations() {
        assert!(Args::try_parse_from(["tokenwarden", "--jwt-valid-time", "0"]).is_err());
        assert!(Args::try_parse_from(["tokenwarden", "--jwt-refresh-threshold", "0"]).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_durations() {
        for value in ["18446744073709551615", "4294967296", "-1"] {
            assert!(
                Args::try_parse_from(["tokenwarden", "--jwt-valid-time", value]).is_err(),
                "accepted valid time {value}"
            );
            assert!(
                Args::try_parse_from(["tokenwarden", "--jwt-refresh-threshold", value]).is_err(),
                "accepted refresh threshold {value}"
            );
        }
    }

    #[test]
    fn test_largest_duration_is_usable() {
        let args =
            Args::try_parse_from(["tokenwarden", "--jwt-valid-time", "4294967295"]).unwrap();
        let policy = token_policy(&args);
        assert_eq!(policy.validity_window, TimeDelta::seconds(4_294_967_295));
        assert!(
            chrono::Utc::now()
                .checked_add_signed(policy.validity_window)
                .is_some()
        );
    }

    #[test]
    fn test_secret_file_too_short() {
        let path = std::env::temp_dir().join(format!("tokenwarden-key-{}", uuid::Uuid::new_v4()));
        std::fs::write(&path, "short\n").unwrap();
        if std::env::var(JWT_KEY_ENV).is_err() {
            assert!(load_jwt_secret(Some(path.to_str().unwrap())).is_none());
        }
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_secret_file() {
        let path = std::env::temp_dir().join(format!("tokenwarden-key-{}", uuid::Uuid::new_v4()));
        let secret = "x".repeat(MIN_JWT_SECRET_LENGTH);
        std::fs::write(&path, format!("{}\n", secret)).unwrap();
        if std::env::var(JWT_KEY_ENV).is_err() {
            assert_eq!(
                load_jwt_secret(Some(path.to_str().unwrap())).as_deref(),
                Some(secret.as_str())
            );
        }
        let _ = std::fs::remove_file(&path);
    }
}
