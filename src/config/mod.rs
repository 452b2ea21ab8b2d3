use std::env;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// 未配置时使用内存存储（仅开发用）
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// 未配置时使用进程内缓存
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub user_cache_ttl_secs: u64,
    pub cache_sweep_interval_secs: u64,
    pub session_sweep_interval_secs: u64,
    pub login_max_attempts: u32,
    pub login_attempt_window_secs: u64,
    pub bcrypt_cost: u32,
    pub enforce_status_on_requests: bool,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty());

        let secs = |key: &'static str, default: u64| -> Result<u64, ConfigError> {
            match var(key) {
                Some(value) => parse_duration_secs(&value)
                    .ok_or(ConfigError::Invalid { key, value }),
                None => Ok(default),
            }
        };

        // 周期与有效期不能为 0
        let positive_secs = |key: &'static str, default: u64| -> Result<u64, ConfigError> {
            match secs(key, default)? {
                0 => Err(ConfigError::Invalid {
                    key,
                    value: var(key).unwrap_or_default(),
                }),
                n => Ok(n),
            }
        };

        Ok(Config {
            database_url: var("DATABASE_URL"),
            db_max_connections: parse_or(var("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", 20)?,
            redis_url: var("REDIS_URL"),
            jwt_secret: var("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?,
            jwt_expiration_secs: positive_secs("JWT_EXPIRATION", 7 * 24 * 3600)?,
            user_cache_ttl_secs: secs("USER_CACHE_TTL", 3600)?,
            cache_sweep_interval_secs: positive_secs("CACHE_SWEEP_INTERVAL", 60)?,
            session_sweep_interval_secs: positive_secs("SESSION_SWEEP_INTERVAL", 3600)?,
            login_max_attempts: parse_or(var("LOGIN_MAX_ATTEMPTS"), "LOGIN_MAX_ATTEMPTS", 5)?,
            login_attempt_window_secs: positive_secs("LOGIN_ATTEMPT_WINDOW", 15 * 60)?,
            bcrypt_cost: parse_or(var("BCRYPT_COST"), "BCRYPT_COST", 10)?,
            enforce_status_on_requests: parse_or(
                var("AUTH_ENFORCE_STATUS_ON_REQUESTS"),
                "AUTH_ENFORCE_STATUS_ON_REQUESTS",
                false,
            )?,
            server_host: var("SERVER_HOST").unwrap_or_else(|| "::".into()),
            server_port: parse_or(var("SERVER_PORT"), "SERVER_PORT", 3000)?,
            api_base_uri: var("API_BASE_URI").unwrap_or_else(|| "/api".into()),
        })
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }

    pub fn user_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.user_cache_ttl_secs)
    }

    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_interval_secs)
    }

    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_interval_secs)
    }

    pub fn login_attempt_window(&self) -> Duration {
        Duration::from_secs(self.login_attempt_window_secs)
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

/// 解析 `90`、`30s`、`15m`、`24h`、`7d` 形式的时长，返回秒数
pub fn parse_duration_secs(value: &str) -> Option<u64> {
    let value = value.trim();
    let (number, unit) = match value.char_indices().last()? {
        (idx, c) if c.is_ascii_alphabetic() => (&value[..idx], c),
        _ => (value, 's'),
    };
    let number: u64 = number.trim().parse().ok()?;
    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 24 * 3600,
        _ => return None,
    };
    number.checked_mul(multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parses_duration_suffixes() {
        assert_eq!(parse_duration_secs("90"), Some(90));
        assert_eq!(parse_duration_secs("30s"), Some(30));
        assert_eq!(parse_duration_secs("15m"), Some(900));
        assert_eq!(parse_duration_secs("24h"), Some(86_400));
        assert_eq!(parse_duration_secs("7d"), Some(604_800));
        assert_eq!(parse_duration_secs("7w"), None);
        assert_eq!(parse_duration_secs("h"), None);
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = Config::from_lookup(lookup(&[("JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.jwt_expiration_secs, 604_800);
        assert_eq!(config.user_cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.login_max_attempts, 5);
        assert_eq!(config.login_attempt_window_secs, 900);
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.api_base_uri, "/api");
        assert!(config.database_url.is_none());
        assert!(!config.enforce_status_on_requests);
    }

    #[test]
    fn secret_is_required() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JWT_SECRET")));
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = Config::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("SERVER_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SERVER_PORT", .. }));
    }

    #[test]
    fn zero_intervals_are_rejected() {
        for key in ["CACHE_SWEEP_INTERVAL", "SESSION_SWEEP_INTERVAL", "JWT_EXPIRATION"] {
            let err = Config::from_lookup(lookup(&[("JWT_SECRET", "s3cret"), (key, "0s")]))
                .unwrap_err();
            assert!(
                matches!(&err, ConfigError::Invalid { key: k, value } if *k == key && value == "0s"),
                "{key}: {err}"
            );
        }

        let config = Config::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("CACHE_SWEEP_INTERVAL", "1s"),
        ]))
        .unwrap();
        assert_eq!(config.cache_sweep_interval(), Duration::from_secs(1));
    }
}
