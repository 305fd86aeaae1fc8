use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
#[non_exhaustive]
pub struct Config {
    /// Advertised local name.
    pub local_name: String,
    /// Maximum time to wait for the adapter to complete a service registration
    /// or advertising start. Waits are unbounded if `None`. Serialized in
    /// milliseconds.
    #[serde(with = "millis")]
    pub timeout: Option<Duration>,
    /// Include the UUIDs of registered primary services in the advertising
    /// data.
    pub advertise_services: bool,
}

impl Config {
    /// Default advertised local name.
    pub const LOCAL_NAME: &'static str = "GATT Server";

    /// Sets the advertised local name.
    #[inline]
    #[must_use]
    pub fn local_name(mut self, name: impl Into<String>) -> Self {
        self.local_name = name.into();
        self
    }

    /// Sets the completion timeout.
    #[inline]
    #[must_use]
    pub fn timeout(mut self, t: Option<Duration>) -> Self {
        self.timeout = t;
        self
    }

    /// Sets whether primary service UUIDs are advertised.
    #[inline]
    #[must_use]
    pub fn advertise_services(mut self, v: bool) -> Self {
        self.advertise_services = v;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            local_name: Self::LOCAL_NAME.to_owned(),
            timeout: None,
            advertise_services: true,
        }
    }
}

#[cfg(feature = "json")]
pub use json::*;

#[cfg(feature = "json")]
mod json {
    use std::path::Path;
    use std::{fs, io};

    use tracing::debug;

    use super::Config;

    /// Error returned when loading a configuration file.
    #[derive(Debug, thiserror::Error)]
    #[non_exhaustive]
    pub enum ConfigError {
        #[error("failed to read config: {0}")]
        Io(#[from] io::Error),
        #[error("invalid config: {0}")]
        Json(#[from] serde_json::Error),
    }

    impl Config {
        /// Parses a JSON configuration. Missing fields take default values.
        pub fn from_json(s: &str) -> Result<Self, ConfigError> {
            Ok(serde_json::from_str(s)?)
        }

        /// Loads a JSON configuration file.
        pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
            let path = path.as_ref();
            let cfg = Self::from_json(&fs::read_to_string(path)?)?;
            debug!("Loaded config: {}", path.display());
            Ok(cfg)
        }
    }
}

/// Serde adapter for an optional duration in milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match t {
            Some(t) => s.serialize_some(&u64::try_from(t.as_millis()).unwrap_or(u64::MAX)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default() {
        let c = Config::default();
        assert_eq!(c.local_name, "GATT Server");
        assert_eq!(c.timeout, None);
        assert!(c.advertise_services);
        let c = c.local_name("x").timeout(Some(Duration::from_secs(1)));
        assert_eq!(c.local_name, "x");
        assert_eq!(c.timeout, Some(Duration::from_millis(1000)));
    }

    #[cfg(feature = "json")]
    #[test]
    fn json() {
        let c = Config::from_json(r#"{"local_name": "Sensor", "timeout": 250}"#).unwrap();
        assert_eq!(c.local_name, "Sensor");
        assert_eq!(c.timeout, Some(Duration::from_millis(250)));
        assert!(c.advertise_services);
        assert_eq!(Config::from_json("{}").unwrap(), Config::default());
        assert_eq!(
            Config::from_json(r#"{"timeout": null, "advertise_services": false}"#).unwrap(),
            Config::default().advertise_services(false)
        );
        assert!(matches!(
            Config::from_json(r#"{"timeout": "soon"}"#),
            Err(ConfigError::Json(_))
        ));
        let s = serde_json::to_string(&c).unwrap();
        assert_eq!(Config::from_json(&s).unwrap(), c);
    }

    #[cfg(feature = "json")]
    #[test]
    fn load() {
        let tmp = (tempfile::Builder::new().prefix("gatt-periph-test-")).tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"local_name": "Loaded"}"#).unwrap();
        assert_eq!(Config::load(&path).unwrap().local_name, "Loaded");
        assert!(matches!(
            Config::load(tmp.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
