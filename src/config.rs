//! Runtime configuration read from the environment (and `.env` in development).

use std::{env, fmt::Display, str::FromStr};

use log::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub mongodb_uri: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub frontend_url: String,
    pub stripe: StripeConfig,
    pub imgbb: ImgbbConfig,
    pub max_upload_bytes: usize,
    pub force_seed: bool,
}

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    /// Optional; without it webhook sessions are re-fetched from Stripe instead of trusted.
    pub webhook_secret: Option<String>,
    pub currency: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct ImgbbConfig {
    pub api_key: String,
    pub api_base: String,
}

impl Config {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let stripe = StripeConfig {
            secret_key: required(&lookup, "STRIPE_SECRET_KEY")?,
            webhook_secret: lookup("STRIPE_WEBHOOK_SECRET").filter(|s| !s.trim().is_empty()),
            currency: try_load(&lookup, "STRIPE_CURRENCY", "usd")?,
            api_base: try_load(&lookup, "STRIPE_API_BASE", "https://api.stripe.com")?,
        };
        let imgbb = ImgbbConfig {
            api_key: required(&lookup, "IMGBB_API_KEY")?,
            api_base: try_load(&lookup, "IMGBB_API_BASE", "https://api.imgbb.com")?,
        };

        let jwt_ttl_hours: i64 = try_load(&lookup, "JWT_TTL_HOURS", "168")?;
        if jwt_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "JWT_TTL_HOURS",
                message: "must be positive".into(),
            });
        }

        Ok(Config {
            host: try_load(&lookup, "HOST", "0.0.0.0")?,
            port: try_load(&lookup, "PORT", "8080")?,
            mongodb_uri: try_load(&lookup, "MONGODB_URI", "mongodb://localhost:27017")?,
            database_name: try_load(&lookup, "DATABASE_NAME", "safari_booking")?,
            jwt_secret: required(&lookup, "JWT_SECRET")?,
            jwt_ttl_hours,
            frontend_url: try_load::<String, _>(&lookup, "FRONTEND_URL", "http://localhost:5173")?
                .trim_end_matches('/')
                .to_string(),
            stripe,
            imgbb,
            max_upload_bytes: try_load(&lookup, "MAX_UPLOAD_BYTES", "5242880")?,
            force_seed: try_load(&lookup, "FORCE_SEED", "false")?,
        })
    }
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn try_load<T, F>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{} not set, using default: {}", key, default);
        default.to_string()
    });
    raw.trim().parse().map_err(|e: T::Err| {
        warn!("Invalid {} value: {}", key, e);
        ConfigError::Invalid {
            key,
            message: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("JWT_SECRET", "s3cr3t"),
        ("STRIPE_SECRET_KEY", "sk_test_123"),
        ("IMGBB_API_KEY", "imgbb-key"),
    ];

    #[test]
    fn defaults_fill_optional_keys() {
        let config = Config::from_lookup(lookup_from(&REQUIRED)).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_name, "safari_booking");
        assert_eq!(config.jwt_ttl_hours, 168);
        assert_eq!(config.stripe.currency, "usd");
        assert!(config.stripe.webhook_secret.is_none());
        assert_eq!(config.max_upload_bytes, 5 * 1024 * 1024);
        assert!(!config.force_seed);
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("PORT", "9000"),
            ("FORCE_SEED", "true"),
            ("FRONTEND_URL", "https://safari.example.com/"),
            ("STRIPE_WEBHOOK_SECRET", "whsec_abc"),
        ]);
        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.port, 9000);
        assert!(config.force_seed);
        assert_eq!(config.frontend_url, "https://safari.example.com");
        assert_eq!(config.stripe.webhook_secret.as_deref(), Some("whsec_abc"));
    }

    #[test]
    fn missing_secret_is_an_error() {
        let err = Config::from_lookup(lookup_from(&REQUIRED[1..])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JWT_SECRET")));
    }

    #[test]
    fn bad_port_is_an_error() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PORT", "not-a-port"));
        let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }
}
