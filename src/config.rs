use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DbError;
use crate::types::DriverKind;

/// Everything needed to open one driver connection.
///
/// `options` are passed through unchanged to the chosen driver (for example
/// `port`, `busy_timeout`, `url`). The password is never serialized and is
/// redacted from `Debug` output.
///
/// ```rust
/// use sql_facade::prelude::*;
///
/// let settings: ConnectionSettings = serde_json::from_str(
///     r#"{"driver": "sqlite", "database": ":memory:", "options": {"busy_timeout": "250"}}"#,
/// )
/// .unwrap();
/// assert_eq!(settings.option_parsed::<u64>("busy_timeout").unwrap(), Some(250));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub driver: DriverKind,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub user: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    pub database: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl ConnectionSettings {
    #[must_use]
    pub fn new(driver: DriverKind, database: impl Into<String>) -> Self {
        Self {
            driver,
            host: String::new(),
            user: String::new(),
            password: String::new(),
            database: database.into(),
            options: BTreeMap::new(),
        }
    }

    /// Settings for a driver named by external configuration.
    ///
    /// # Errors
    /// `DbErrorKind::Config` when no driver has that name.
    pub fn for_driver_name(name: &str, database: impl Into<String>) -> Result<Self, DbError> {
        Ok(Self::new(DriverKind::resolve(name)?, database))
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Parse an option; absent or blank options are `None`.
    ///
    /// # Errors
    /// `DbErrorKind::Config` when the option is present but malformed.
    pub fn option_parsed<T>(&self, key: &str) -> Result<Option<T>, DbError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.option_str(key)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|e| {
                    DbError::config(format!("option '{key}' has invalid value '{raw}': {e}"))
                })
            })
            .transpose()
    }

    /// Parse an on/off style option.
    ///
    /// # Errors
    /// `DbErrorKind::Config` for anything other than on/off, true/false, 1/0, yes/no.
    pub fn option_flag(&self, key: &str) -> Result<Option<bool>, DbError> {
        self.option_str(key)
            .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "on" | "true" | "yes" => Ok(true),
                "0" | "off" | "false" | "no" => Ok(false),
                _ => Err(DbError::config(format!(
                    "option '{key}' must be on or off, got '{raw}'"
                ))),
            })
            .transpose()
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("database", &self.database)
            .field("options", &self.options)
            .finish()
    }
}
