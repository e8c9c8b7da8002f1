use chrono::Duration;
use std::env;

/// Log output style, chosen with `LOG_FORMAT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Application configuration read from the environment
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub cors_origin: Option<String>,
    pub rate_limit_enabled: bool,
    pub log_format: LogFormat,
    pub bcrypt_cost: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let shared_secret = get("JWT_SECRET");
        let access_token_secret = get("ACCESS_TOKEN_SECRET")
            .or_else(|| shared_secret.clone())
            .ok_or(ConfigError::Missing("ACCESS_TOKEN_SECRET"))?;
        let refresh_token_secret = get("REFRESH_TOKEN_SECRET")
            .or(shared_secret)
            .ok_or(ConfigError::Missing("REFRESH_TOKEN_SECRET"))?;

        let access_token_ttl = match get("ACCESS_TOKEN_TTL") {
            Some(raw) => parse_ttl("ACCESS_TOKEN_TTL", &raw)?,
            None => Duration::minutes(15),
        };
        let refresh_token_ttl = match get("REFRESH_TOKEN_TTL") {
            Some(raw) => parse_ttl("REFRESH_TOKEN_TTL", &raw)?,
            None => Duration::days(7),
        };

        let rate_limit_enabled = match get("RATE_LIMIT_ENABLED") {
            Some(raw) => parse_bool("RATE_LIMIT_ENABLED", &raw)?,
            None => true,
        };

        let log_format = match get("LOG_FORMAT").as_deref() {
            None | Some("pretty") | Some("text") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    value: other.to_string(),
                });
            }
        };

        let bcrypt_cost = parse_number("BCRYPT_COST", get("BCRYPT_COST"), bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                name: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
            });
        }

        Ok(Self {
            database_url,
            database_max_connections: parse_number(
                "DATABASE_MAX_CONNECTIONS",
                get("DATABASE_MAX_CONNECTIONS"),
                5,
            )?,
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_number("PORT", get("PORT"), 8080)?,
            access_token_secret,
            refresh_token_secret,
            access_token_ttl,
            refresh_token_ttl,
            cors_origin: get("CORS_ORIGIN"),
            rate_limit_enabled,
            log_format,
            bcrypt_cost,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_number<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw.to_string(),
        }),
    }
}

/// Longest accepted token lifetime; expiry timestamps must stay representable
const MAX_TTL_DAYS: i64 = 3650;

/// Parses `30s`, `15m`, `12h`, `7d` or a bare number of seconds
pub fn parse_ttl(name: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::Invalid {
        name,
        value: raw.to_string(),
    };

    let (digits, unit) = match raw.char_indices().last() {
        Some((index, c)) if c.is_ascii_alphabetic() => (&raw[..index], Some(c)),
        _ => (raw, None),
    };
    let amount: i64 = digits.trim().parse().map_err(|_| invalid())?;
    if amount <= 0 {
        return Err(invalid());
    }

    let ttl = match unit.map(|c| c.to_ascii_lowercase()) {
        None | Some('s') => Duration::try_seconds(amount),
        Some('m') => Duration::try_minutes(amount),
        Some('h') => Duration::try_hours(amount),
        Some('d') => Duration::try_days(amount),
        Some(_) => None,
    };
    ttl.filter(|ttl| *ttl <= Duration::days(MAX_TTL_DAYS))
        .ok_or_else(invalid)
}
