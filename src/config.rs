//! Connection configuration.

use std::env;
use std::time::Duration;
use crate::error::{ Error, ErrorKind, Result, ResultExt };

/// Environment variable holding the connection string.
pub const URI_VAR: &str = "FOLIO_URI";
/// Environment variable holding the database name.
pub const DATABASE_VAR: &str = "FOLIO_DATABASE";
/// Environment variable holding the collection name.
pub const COLLECTION_VAR: &str = "FOLIO_COLLECTION";
/// Environment variable holding the default operation deadline, in ms.
pub const TIMEOUT_VAR: &str = "FOLIO_TIMEOUT_MS";
/// Environment variable holding the connect (server selection) timeout, in ms.
pub const CONNECT_TIMEOUT_VAR: &str = "FOLIO_CONNECT_TIMEOUT_MS";

/// Where to connect and how long to wait.
/// ```
/// # use std::time::Duration;
/// # use folio::config::Config;
/// #
/// let config = Config::default()
///     .with_collection("magazines")
///     .with_operation_timeout(Duration::from_secs(2));
///
/// assert_eq!(config.uri, "mongodb://127.0.0.1:27017");
/// assert_eq!(config.database, "plp_bookstore");
/// assert_eq!(config.collection, "magazines");
/// assert_eq!(config.operation_timeout, Some(Duration::from_secs(2)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Connection string, `scheme://host:port`.
    pub uri: String,
    /// Name of the database holding the collection.
    pub database: String,
    /// Name of the collection the gateway operates on.
    pub collection: String,
    /// Deadline applied to operations that don't specify their own.
    /// `None` means unbounded.
    pub operation_timeout: Option<Duration>,
    /// How long to wait for a reachable server while connecting.
    /// `None` leaves the driver's default in place.
    pub connect_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            uri: String::from("mongodb://127.0.0.1:27017"),
            database: String::from("plp_bookstore"),
            collection: String::from("books"),
            operation_timeout: None,
            connect_timeout: Some(Duration::from_secs(5)),
        }
    }
}

impl Config {
    /// The default configuration, overridden by the `FOLIO_*` environment
    /// variables that are set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// The default configuration, overridden by the values `lookup` returns
    /// for the `FOLIO_*` keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
        where F: Fn(&str) -> Option<String>
    {
        let mut config = Self::default();

        if let Some(uri) = lookup(URI_VAR) {
            config.uri = uri;
        }
        if let Some(database) = lookup(DATABASE_VAR) {
            config.database = database;
        }
        if let Some(collection) = lookup(COLLECTION_VAR) {
            config.collection = collection;
        }
        if let Some(ms) = lookup(TIMEOUT_VAR) {
            config.operation_timeout = Some(parse_millis(TIMEOUT_VAR, &ms)?);
        }
        if let Some(ms) = lookup(CONNECT_TIMEOUT_VAR) {
            config.connect_timeout = Some(parse_millis(CONNECT_TIMEOUT_VAR, &ms)?);
        }

        Ok(config)
    }

    /// Sets the connection string.
    pub fn with_uri<S: Into<String>>(mut self, uri: S) -> Self {
        self.uri = uri.into();
        self
    }

    /// Sets the database name.
    pub fn with_database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = database.into();
        self
    }

    /// Sets the collection name.
    pub fn with_collection<S: Into<String>>(mut self, collection: S) -> Self {
        self.collection = collection.into();
        self
    }

    /// Sets the default operation deadline.
    pub fn with_operation_timeout<T: Into<Option<Duration>>>(mut self, timeout: T) -> Self {
        self.operation_timeout = timeout.into();
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout<T: Into<Option<Duration>>>(mut self, timeout: T) -> Self {
        self.connect_timeout = timeout.into();
        self
    }
}

/// A positive number of milliseconds.
fn parse_millis(key: &'static str, value: &str) -> Result<Duration> {
    let ms = value
        .trim()
        .parse::<u64>()
        .chain(move || format!("{} must be a number of milliseconds, got `{}`", key, value))?;

    if ms == 0 {
        return Err(Error::new(ErrorKind::Config, format!("{} must be positive, got `{}`", key, value)));
    }

    Ok(Duration::from_millis(ms))
}
