//! Connection parameters and the deployment-environment resolver.
//!
//! Parameters are resolved once at process start from environment variables.
//! The `DB_ENV` selector picks one of three targets, each reading its own
//! prefixed variables:
//!
//! | `DB_ENV` | Prefix | Host default | Port default | Database default |
//! |----------|--------|--------------|--------------|------------------|
//! | `local` | `LOCAL_DB_` | `localhost` | `3306` | `broffice` |
//! | `remote` | `REMOTE_DB_` | `127.0.0.1` | `3307` | required |
//! | `production` | `PROD_DB_` | required | `3306` | required |
//!
//! `<PREFIX>USER` and `<PREFIX>PASSWORD` have no fallback in any environment:
//! a missing credential is reported at startup rather than on first use.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Environment variable selecting the deployment target.
pub const ENVIRONMENT_SELECTOR: &str = "DB_ENV";

/// Session time zone applied to every new connection.
pub const DEFAULT_TIME_ZONE: &str = "+09:00";

/// Character set negotiated for every new connection.
pub const DEFAULT_CHARSET: &str = "utf8mb4";

/// Errors raised while resolving connection parameters.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("required environment variable {name} is not set")]
    MissingVariable {
        /// Variable name.
        name: String,
    },

    /// A variable is set but cannot be parsed.
    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidValue {
        /// Variable name.
        name: String,
        /// The offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The deployment selector names no known environment.
    #[error("unknown deployment environment {0:?} (expected local, remote or production)")]
    UnknownEnvironment(String),

    /// Parameters are internally inconsistent.
    #[error("invalid connection parameters: {0}")]
    Invalid(String),
}

/// Deployment target selected by `DB_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeploymentEnvironment {
    /// Developer workstation database.
    Local,
    /// Shared test database reached through an SSH tunnel on a local port.
    Remote,
    /// Production database inside the hosting provider's network.
    Production,
}

impl DeploymentEnvironment {
    /// All environments, in selector order.
    pub const ALL: [Self; 3] = [Self::Local, Self::Remote, Self::Production];

    /// Environment used when `DB_ENV` is unset.
    pub const DEFAULT: Self = Self::Remote;

    /// Variable prefix for this environment's connection settings.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Local => "LOCAL_DB_",
            Self::Remote => "REMOTE_DB_",
            Self::Production => "PROD_DB_",
        }
    }

    /// Selector value naming this environment.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::Production => "production",
        }
    }

    fn default_host(self) -> Option<&'static str> {
        match self {
            Self::Local => Some("localhost"),
            Self::Remote => Some("127.0.0.1"),
            Self::Production => None,
        }
    }

    fn default_port(self) -> u16 {
        match self {
            Self::Remote => 3307,
            Self::Local | Self::Production => 3306,
        }
    }

    fn default_database(self) -> Option<&'static str> {
        match self {
            Self::Local => Some("broffice"),
            Self::Remote | Self::Production => None,
        }
    }

    /// Hosted servers may advertise GSSAPI; those targets fall back to
    /// native password auth.
    fn auth_plugin_map(self) -> Vec<AuthPluginMapping> {
        match self {
            Self::Local => Vec::new(),
            Self::Remote | Self::Production => vec![AuthPluginMapping::new(
                "auth_gssapi_client",
                "mysql_native_password",
            )],
        }
    }

    /// Read the selector from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the selector through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(ENVIRONMENT_SELECTOR) {
            Some(value) => value.parse(),
            None => Ok(Self::DEFAULT),
        }
    }
}

impl FromStr for DeploymentEnvironment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::UnknownEnvironment(other.to_string())),
        }
    }
}

impl fmt::Display for DeploymentEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Username/password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Username.
    pub username: Cow<'static, str>,
    /// Password.
    pub password: Cow<'static, str>,
}

impl Credentials {
    /// Create a credential pair.
    pub fn new(
        username: impl Into<Cow<'static, str>>,
        password: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never expose the password in debug output
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Authentication plugin substitution requested by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPluginMapping {
    /// Plugin advertised by the server.
    pub server_plugin: String,
    /// Plugin the client answers with instead.
    pub client_plugin: String,
}

impl AuthPluginMapping {
    /// Create a mapping from a server plugin to a client plugin.
    pub fn new(server_plugin: impl Into<String>, client_plugin: impl Into<String>) -> Self {
        Self {
            server_plugin: server_plugin.into(),
            client_plugin: client_plugin.into(),
        }
    }
}

/// Parameters for opening a database session.
///
/// This struct is marked `#[non_exhaustive]`. Use
/// [`ConnectionParameters::from_env()`] or [`ConnectionParameters::new()`]
/// with the builder methods to construct instances.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ConnectionParameters {
    /// Deployment target these parameters were resolved for.
    pub environment: DeploymentEnvironment,

    /// Server hostname or IP address.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Authentication credentials.
    pub credentials: Credentials,

    /// Database (schema) name.
    pub database: String,

    /// Connection character set.
    pub charset: String,

    /// Session time zone, as a UTC offset.
    pub time_zone: String,

    /// Whether the session runs in auto-commit mode. Disabled by default:
    /// writes become durable only on an explicit commit.
    pub autocommit: bool,

    /// Time allowed for establishing a session.
    pub connect_timeout: Duration,

    /// Authentication plugin substitutions.
    pub auth_plugin_map: Vec<AuthPluginMapping>,
}

impl ConnectionParameters {
    /// Create parameters with default session settings.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        credentials: Credentials,
        database: impl Into<String>,
    ) -> Self {
        Self {
            environment: DeploymentEnvironment::Local,
            host: host.into(),
            port,
            credentials,
            database: database.into(),
            charset: DEFAULT_CHARSET.to_string(),
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            autocommit: false,
            connect_timeout: Duration::from_secs(10),
            auth_plugin_map: Vec::new(),
        }
    }

    /// Resolve parameters for the environment selected by `DB_ENV`.
    ///
    /// A `.env` file in the working directory is loaded first, if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded environment file");
        }
        let environment = DeploymentEnvironment::from_env()?;
        Self::for_environment(environment)
    }

    /// Resolve parameters for a specific environment from process variables.
    pub fn for_environment(environment: DeploymentEnvironment) -> Result<Self, ConfigError> {
        Self::resolve(environment, |key| std::env::var(key).ok())
    }

    /// Resolve parameters for an environment through an arbitrary lookup.
    ///
    /// Host, port and (for `local`) database name fall back to defaults;
    /// credentials never do.
    pub fn resolve<F>(environment: DeploymentEnvironment, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = environment.prefix();
        let var = |suffix: &str| {
            let name = format!("{prefix}{suffix}");
            let value = lookup(&name);
            (name, value)
        };
        let required = |suffix: &str, fallback: Option<&'static str>| {
            let (name, value) = var(suffix);
            value
                .or_else(|| fallback.map(str::to_string))
                .ok_or(ConfigError::MissingVariable { name })
        };

        let host = required("HOST", environment.default_host())?;
        let port = match var("PORT") {
            (name, Some(raw)) => raw.trim().parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                name,
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            (_, None) => environment.default_port(),
        };
        let username = required("USER", None)?;
        let password = required("PASSWORD", None)?;
        let database = required("NAME", environment.default_database())?;

        let params = Self {
            environment,
            auth_plugin_map: environment.auth_plugin_map(),
            ..Self::new(host, port, Credentials::new(username, password), database)
        };
        params.validate()?;

        tracing::info!(
            environment = %environment,
            target = %params.redacted_url(),
            "resolved database connection parameters"
        );
        Ok(params)
    }

    /// Set the server host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the server port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the database name.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the credentials.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set the session time zone offset (e.g. `+00:00`).
    #[must_use]
    pub fn time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = time_zone.into();
        self
    }

    /// Set the connection character set.
    #[must_use]
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Enable or disable session auto-commit.
    #[must_use]
    pub fn autocommit(mut self, enabled: bool) -> Self {
        self.autocommit = enabled;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Add an authentication plugin substitution.
    #[must_use]
    pub fn map_auth_plugin(mut self, mapping: AuthPluginMapping) -> Self {
        self.auth_plugin_map.push(mapping);
        self
    }

    /// Connection target without the password, suitable for logs.
    #[must_use]
    pub fn redacted_url(&self) -> String {
        format!(
            "mysql://{}@{}:{}/{}",
            self.credentials.username, self.host, self.port, self.database
        )
    }

    /// Validate the parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be greater than 0".into()));
        }
        if self.credentials.username.is_empty() {
            return Err(ConfigError::Invalid("username must not be empty".into()));
        }
        if self.database.trim().is_empty() {
            return Err(ConfigError::Invalid("database must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_selector_defaults_to_remote() {
        let env = DeploymentEnvironment::from_lookup(lookup(&[])).unwrap();
        assert_eq!(env, DeploymentEnvironment::Remote);
    }

    #[test]
    fn test_selector_parses_known_values() {
        for env in DeploymentEnvironment::ALL {
            assert_eq!(env.as_str().parse::<DeploymentEnvironment>().unwrap(), env);
        }
        assert_eq!(
            " Production ".parse::<DeploymentEnvironment>().unwrap(),
            DeploymentEnvironment::Production
        );
    }

    #[test]
    fn test_selector_rejects_unknown() {
        let err = DeploymentEnvironment::from_lookup(lookup(&[("DB_ENV", "staging")])).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownEnvironment(ref v) if v == "staging"));
    }

    #[test]
    fn test_remote_fallbacks() {
        let params = ConnectionParameters::resolve(
            DeploymentEnvironment::Remote,
            lookup(&[
                ("REMOTE_DB_USER", "broffice"),
                ("REMOTE_DB_PASSWORD", "secret"),
                ("REMOTE_DB_NAME", "broffice$default"),
            ]),
        )
        .unwrap();

        assert_eq!(params.host, "127.0.0.1");
        assert_eq!(params.port, 3307);
        assert_eq!(params.database, "broffice$default");
        assert_eq!(params.charset, "utf8mb4");
        assert_eq!(params.time_zone, "+09:00");
        assert!(!params.autocommit);
        assert_eq!(params.auth_plugin_map.len(), 1);
        assert_eq!(params.auth_plugin_map[0].server_plugin, "auth_gssapi_client");
    }

    #[test]
    fn test_local_fallbacks() {
        let params = ConnectionParameters::resolve(
            DeploymentEnvironment::Local,
            lookup(&[("LOCAL_DB_USER", "root"), ("LOCAL_DB_PASSWORD", "")]),
        )
        .unwrap();

        assert_eq!(params.host, "localhost");
        assert_eq!(params.port, 3306);
        assert_eq!(params.database, "broffice");
        assert!(params.auth_plugin_map.is_empty());
    }

    #[test]
    fn test_missing_password_is_an_error() {
        let err = ConnectionParameters::resolve(
            DeploymentEnvironment::Local,
            lookup(&[("LOCAL_DB_USER", "root")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingVariable { ref name } if name == "LOCAL_DB_PASSWORD"));
    }

    #[test]
    fn test_production_requires_host() {
        let err = ConnectionParameters::resolve(
            DeploymentEnvironment::Production,
            lookup(&[
                ("PROD_DB_USER", "app"),
                ("PROD_DB_PASSWORD", "pw"),
                ("PROD_DB_NAME", "broffice"),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingVariable { ref name } if name == "PROD_DB_HOST"));
    }

    #[test]
    fn test_invalid_port() {
        let err = ConnectionParameters::resolve(
            DeploymentEnvironment::Local,
            lookup(&[
                ("LOCAL_DB_USER", "root"),
                ("LOCAL_DB_PASSWORD", "pw"),
                ("LOCAL_DB_PORT", "33o6"),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref name, .. } if name == "LOCAL_DB_PORT"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let params = ConnectionParameters::new(
            "db.internal",
            3306,
            Credentials::new("app", "hunter2"),
            "broffice",
        );
        let debug = format!("{params:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
        assert_eq!(params.redacted_url(), "mysql://app@db.internal:3306/broffice");
    }

    #[test]
    fn test_builder_methods() {
        let params = ConnectionParameters::new("h", 1, Credentials::new("u", "p"), "d")
            .host("db")
            .port(3310)
            .database("other")
            .time_zone("+00:00")
            .charset("utf8")
            .autocommit(true)
            .connect_timeout(Duration::from_secs(3));

        assert_eq!(params.host, "db");
        assert_eq!(params.port, 3310);
        assert_eq!(params.database, "other");
        assert_eq!(params.time_zone, "+00:00");
        assert_eq!(params.charset, "utf8");
        assert!(params.autocommit);
        assert_eq!(params.connect_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_validate_rejects_empty_username() {
        let params = ConnectionParameters::new("db", 3306, Credentials::new("", "p"), "d");
        assert!(params.validate().is_err());
    }
}
