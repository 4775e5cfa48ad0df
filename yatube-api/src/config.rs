use crate::InitError;
use serde::Deserialize;
use std::net::IpAddr;
use time::Duration;
use tracing::debug;
use yatube_common::util::PositiveDuration;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct Env {
    pub server_address: IpAddr,
    pub server_port: u16,
    /// Without it, everything lives in memory and is gone on shutdown.
    pub database_url: Option<String>,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    #[serde(default = "default_page_cache_ttl_seconds")]
    page_cache_ttl_seconds: i64,
    token_lifetime_days: Option<i64>,
}

/// Roughly a century.
pub const MAX_TOKEN_LIFETIME_DAYS: i64 = 36_500;

fn default_database_max_connections() -> u32 {
    5
}

fn default_page_cache_ttl_seconds() -> i64 {
    20
}

impl Env {
    pub fn page_cache_ttl(&self) -> Result<PositiveDuration, InitError> {
        Ok(PositiveDuration::try_from(Duration::seconds(
            self.page_cache_ttl_seconds,
        ))?)
    }

    pub fn token_lifetime(&self) -> Result<Option<PositiveDuration>, InitError> {
        self.token_lifetime_days
            .map(|days| -> Result<_, InitError> {
                if days > MAX_TOKEN_LIFETIME_DAYS {
                    return Err(InitError::TokenLifetimeTooLong(days));
                }
                // Clamped so that huge negative values cannot overflow.
                Ok(PositiveDuration::try_from(Duration::days(days.max(0)))?)
            })
            .transpose()
    }
}

pub fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .env file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

#[cfg(test)]
mod tests {
    use crate::{InitError, config::Env};
    use std::net::{IpAddr, Ipv4Addr};

    fn env(vars: &[(&str, &str)]) -> Result<Env, envy::Error> {
        envy::from_iter(
            vars.iter()
                .map(|(key, value)| ((*key).to_owned(), (*value).to_owned())),
        )
    }

    #[test]
    fn defaults() {
        let env = env(&[("SERVER_ADDRESS", "127.0.0.1"), ("SERVER_PORT", "8000")]).unwrap();

        assert_eq!(env.server_address, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(env.server_port, 8000);
        assert_eq!(env.database_url, None);
        assert_eq!(env.database_max_connections, 5);
        assert_eq!(env.page_cache_ttl().unwrap().whole_seconds(), 20);
        assert_eq!(env.token_lifetime().unwrap(), None);
    }

    #[test]
    fn overrides() {
        let env = env(&[
            ("SERVER_ADDRESS", "0.0.0.0"),
            ("SERVER_PORT", "80"),
            ("DATABASE_URL", "postgres://localhost/yatube"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("PAGE_CACHE_TTL_SECONDS", "60"),
            ("TOKEN_LIFETIME_DAYS", "30"),
        ])
        .unwrap();

        assert_eq!(env.database_url.as_deref(), Some("postgres://localhost/yatube"));
        assert_eq!(env.database_max_connections, 12);
        assert_eq!(env.page_cache_ttl().unwrap().whole_seconds(), 60);
        assert_eq!(
            env.token_lifetime().unwrap().unwrap().whole_seconds(),
            30 * 24 * 60 * 60
        );
    }

    #[test]
    fn durations_must_be_positive() {
        let env = env(&[
            ("SERVER_ADDRESS", "127.0.0.1"),
            ("SERVER_PORT", "8000"),
            ("PAGE_CACHE_TTL_SECONDS", "0"),
            ("TOKEN_LIFETIME_DAYS", "-1"),
        ])
        .unwrap();

        assert!(matches!(env.page_cache_ttl(), Err(InitError::Duration(_))));
        assert!(matches!(env.token_lifetime(), Err(InitError::Duration(_))));

        let env = Env {
            token_lifetime_days: Some(i64::MIN),
            ..env
        };
        assert!(matches!(env.token_lifetime(), Err(InitError::Duration(_))));
    }

    #[test]
    fn token_lifetime_is_bounded() {
        let env = env(&[
            ("SERVER_ADDRESS", "127.0.0.1"),
            ("SERVER_PORT", "8000"),
            ("TOKEN_LIFETIME_DAYS", "10000000"),
        ])
        .unwrap();

        assert!(matches!(
            env.token_lifetime(),
            Err(InitError::TokenLifetimeTooLong(10_000_000))
        ));
    }

    #[test]
    fn server_address_is_required() {
        assert!(env(&[("SERVER_PORT", "8000")]).is_err());
    }
}
