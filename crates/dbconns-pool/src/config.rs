//! Pool configuration.

use std::time::Duration;

use dbconns_client::{ConfigError, DeploymentEnvironment};

use crate::error::PoolError;

/// Default pause between acquisition attempts while the pool is exhausted.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for the connection pool.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future minor versions without breaking changes. Use the builder
/// pattern methods or [`Default::default()`] to construct instances.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct PoolConfig {
    /// Minimum number of connections to maintain.
    pub min_connections: u32,

    /// Maximum number of connections allowed.
    pub max_connections: u32,

    /// Time to wait for a connection before timing out.
    pub connection_timeout: Duration,

    /// Pause between acquisition attempts while the pool is exhausted.
    pub retry_interval: Duration,

    /// Maximum lifetime of a connection. `None` keeps connections forever.
    pub max_lifetime: Option<Duration>,

    /// Whether to ping connections on checkout.
    pub test_on_checkout: bool,

    /// Whether to ping connections on checkin.
    pub test_on_checkin: bool,

    /// Whether to roll back uncommitted work when a connection is returned.
    pub rollback_on_return: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 2,
            max_connections: 10,
            connection_timeout: Duration::from_secs(5),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            max_lifetime: None,
            test_on_checkout: true,
            test_on_checkin: true,
            rollback_on_return: true,
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read pool bounds for `environment` from process variables.
    ///
    /// Reads `<PREFIX>POOL_MIN`, `<PREFIX>POOL_MAX` and
    /// `<PREFIX>POOL_TIMEOUT_SECS`; unset variables keep their defaults.
    pub fn from_env(environment: DeploymentEnvironment) -> Result<Self, ConfigError> {
        Self::from_lookup(environment, |key| std::env::var(key).ok())
    }

    /// Read pool bounds through an arbitrary variable lookup.
    pub fn from_lookup<F>(environment: DeploymentEnvironment, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = environment.prefix();
        let read = |suffix: &str| -> Result<Option<u64>, ConfigError> {
            let name = format!("{prefix}{suffix}");
            match lookup(&name) {
                None => Ok(None),
                Some(value) => value.trim().parse::<u64>().map(Some).map_err(|e| {
                    ConfigError::InvalidValue {
                        name,
                        value,
                        reason: e.to_string(),
                    }
                }),
            }
        };
        let to_u32 = |suffix: &str, v: u64| {
            u32::try_from(v).map_err(|e| ConfigError::InvalidValue {
                name: format!("{prefix}{suffix}"),
                value: v.to_string(),
                reason: e.to_string(),
            })
        };

        let mut config = Self::default();
        if let Some(v) = read("POOL_MIN")? {
            config.min_connections = to_u32("POOL_MIN", v)?;
        }
        if let Some(v) = read("POOL_MAX")? {
            config.max_connections = to_u32("POOL_MAX", v)?;
        }
        if let Some(v) = read("POOL_TIMEOUT_SECS")? {
            config.connection_timeout = Duration::from_secs(v);
        }
        Ok(config)
    }

    /// Set the minimum number of connections.
    #[must_use]
    pub fn min_connections(mut self, count: u32) -> Self {
        self.min_connections = count;
        self
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub fn max_connections(mut self, count: u32) -> Self {
        self.max_connections = count;
        self
    }

    /// Set the connection acquisition timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the pause between acquisition attempts.
    #[must_use]
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Set the maximum connection lifetime.
    #[must_use]
    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = Some(lifetime);
        self
    }

    /// Enable or disable testing connections on checkout.
    #[must_use]
    pub fn test_on_checkout(mut self, enabled: bool) -> Self {
        self.test_on_checkout = enabled;
        self
    }

    /// Enable or disable testing connections on checkin.
    #[must_use]
    pub fn test_on_checkin(mut self, enabled: bool) -> Self {
        self.test_on_checkin = enabled;
        self
    }

    /// Enable or disable rollback of uncommitted work on return.
    #[must_use]
    pub fn rollback_on_return(mut self, enabled: bool) -> Self {
        self.rollback_on_return = enabled;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_connections == 0 {
            return Err(PoolError::Configuration(
                "max_connections must be greater than 0".into(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(PoolError::Configuration(
                "min_connections cannot be greater than max_connections".into(),
            ));
        }
        if self.retry_interval.is_zero() {
            return Err(PoolError::Configuration(
                "retry_interval must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.connection_timeout, Duration::from_secs(5));
        assert_eq!(config.retry_interval, DEFAULT_RETRY_INTERVAL);
        assert!(config.rollback_on_return);
        assert!(config.test_on_checkout);
        assert!(config.test_on_checkin);
        assert!(config.max_lifetime.is_none());
    }

    #[test]
    fn test_config_builder_methods() {
        let config = PoolConfig::new()
            .min_connections(5)
            .max_connections(50)
            .connection_timeout(Duration::from_secs(60))
            .retry_interval(Duration::from_millis(20))
            .max_lifetime(Duration::from_secs(3600))
            .test_on_checkout(false)
            .test_on_checkin(false)
            .rollback_on_return(false);

        assert_eq!(config.min_connections, 5);
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.connection_timeout, Duration::from_secs(60));
        assert_eq!(config.retry_interval, Duration::from_millis(20));
        assert_eq!(config.max_lifetime, Some(Duration::from_secs(3600)));
        assert!(!config.test_on_checkout);
        assert!(!config.test_on_checkin);
        assert!(!config.rollback_on_return);
    }

    #[test]
    fn test_config_validation_success() {
        let config = PoolConfig::new().min_connections(1).max_connections(10);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_min_greater_than_max() {
        let config = PoolConfig::new().min_connections(20).max_connections(10);

        let result = config.validate();
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("min_connections cannot be greater than max_connections")
        );
    }

    #[test]
    fn test_config_validation_zero_max() {
        let config = PoolConfig::new().min_connections(0).max_connections(0);

        let result = config.validate();
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("max_connections must be greater than 0")
        );
    }

    #[test]
    fn test_config_equal_min_max() {
        let config = PoolConfig::new().min_connections(5).max_connections(5);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("PROD_DB_POOL_MIN", "4"),
            ("PROD_DB_POOL_MAX", "16"),
            ("PROD_DB_POOL_TIMEOUT_SECS", "2"),
        ]
        .into_iter()
        .collect();

        let config = PoolConfig::from_lookup(DeploymentEnvironment::Production, |k| {
            vars.get(k).map(|v| (*v).to_string())
        })
        .unwrap();
        assert_eq!(config.min_connections, 4);
        assert_eq!(config.max_connections, 16);
        assert_eq!(config.connection_timeout, Duration::from_secs(2));

        // Other environments' variables are ignored.
        let config = PoolConfig::from_lookup(DeploymentEnvironment::Local, |k| {
            vars.get(k).map(|v| (*v).to_string())
        })
        .unwrap();
        assert_eq!(config.min_connections, 2);
    }

    #[test]
    fn test_from_lookup_invalid() {
        let err = PoolConfig::from_lookup(DeploymentEnvironment::Local, |k| {
            (k == "LOCAL_DB_POOL_MAX").then(|| "many".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref name, .. } if name == "LOCAL_DB_POOL_MAX"));
    }
}
