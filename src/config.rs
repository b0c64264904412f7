//! Service configuration from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `PR_TRIGGERS_BIND_ADDR` | `0.0.0.0:3000` |
//! | `PR_TRIGGERS_WEBHOOK_SECRET` | unset (signatures not checked) |
//! | `GITHUB_TOKEN` | unset |
//! | `PR_TRIGGERS_QUIET_PERIOD_SECS` | `5` |
//!
//! A variable that is set but unparseable is an error rather than a silent
//! fallback to the default.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::dispatch::DEFAULT_QUIET_PERIOD;
use crate::webhooks::WebhookSecret;

pub const ENV_BIND_ADDR: &str = "PR_TRIGGERS_BIND_ADDR";
pub const ENV_WEBHOOK_SECRET: &str = "PR_TRIGGERS_WEBHOOK_SECRET";
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_QUIET_PERIOD_SECS: &str = "PR_TRIGGERS_QUIET_PERIOD_SECS";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is not valid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,

    /// `None` disables signature verification.
    pub webhook_secret: Option<WebhookSecret>,

    /// Token for collaborator lookups whose source names no credentials.
    pub github_token: Option<String>,

    pub quiet_period: Duration,
}

impl Config {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let bind_addr = match get(ENV_BIND_ADDR) {
            Some(value) => parse(ENV_BIND_ADDR, &value)?,
            None => parse(ENV_BIND_ADDR, DEFAULT_BIND_ADDR)?,
        };

        let webhook_secret = get(ENV_WEBHOOK_SECRET)
            .map(|secret| {
                WebhookSecret::new(&secret).map_err(|e| ConfigError::Invalid {
                    var: ENV_WEBHOOK_SECRET,
                    value: "<redacted>".to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let quiet_period = match get(ENV_QUIET_PERIOD_SECS) {
            Some(value) => Duration::from_secs(parse(ENV_QUIET_PERIOD_SECS, &value)?),
            None => DEFAULT_QUIET_PERIOD,
        };

        Ok(Config {
            bind_addr,
            webhook_secret,
            github_token: get(ENV_GITHUB_TOKEN),
            quiet_period,
        })
    }
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
