//! Layered configuration loading
//!
//! Priority, lowest first: serialized defaults, configuration file,
//! prefixed environment variables. Callers apply CLI overrides on the
//! extracted value.

use std::path::Path;

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Build the figment for `defaults` + `file` + `env_prefix*` variables.
///
/// The file format follows the extension (`.yaml`/`.yml`, `.toml`, `.json`).
/// Nested keys in the environment are separated by `__`, so
/// `VFDMON_CONNECTION__BAUD_RATE` sets `connection.baud_rate`.
pub fn layered_figment<T: Serialize>(
    defaults: &T,
    file: Option<&Path>,
    env_prefix: &str,
) -> Result<Figment> {
    let mut figment = Figment::from(Serialized::defaults(defaults));

    if let Some(path) = file {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        figment = match ext.as_deref() {
            Some("yaml") | Some("yml") => figment.merge(Yaml::file(path)),
            Some("toml") => figment.merge(Toml::file(path)),
            Some("json") => figment.merge(Json::file(path)),
            _ => {
                return Err(Error::Config(format!(
                    "Unsupported config format: {}",
                    path.display()
                )))
            },
        };
        info!("Config file: {}", path.display());
    }

    debug!("Config env prefix: {}", env_prefix);
    Ok(figment.merge(Env::prefixed(env_prefix).split("__")))
}

/// Load a configuration value through [`layered_figment`]
pub fn load_layered<T>(defaults: &T, file: Option<&Path>, env_prefix: &str) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let figment = layered_figment(defaults, file, env_prefix)?;
    Ok(figment.extract()?)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Inner {
        rate: u32,
        name: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        inner: Inner,
        interval_ms: u64,
    }

    fn defaults() -> Sample {
        Sample {
            inner: Inner {
                rate: 9600,
                name: "a".to_string(),
            },
            interval_ms: 500,
        }
    }

    fn write_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_only() {
        let loaded = load_layered(&defaults(), None, "CL_TEST_NONE_").unwrap();
        assert_eq!(loaded, defaults());
    }

    #[test]
    fn test_yaml_overrides_defaults() {
        let file = write_file(".yaml", "inner:\n  rate: 19200\ninterval_ms: 250\n");
        let loaded = load_layered(&defaults(), Some(file.path()), "CL_TEST_YAML_").unwrap();
        assert_eq!(loaded.inner.rate, 19200);
        assert_eq!(loaded.inner.name, "a");
        assert_eq!(loaded.interval_ms, 250);
    }

    #[test]
    fn test_toml_file() {
        let file = write_file(".toml", "interval_ms = 1000\n[inner]\nname = \"b\"\n");
        let loaded = load_layered(&defaults(), Some(file.path()), "CL_TEST_TOML_").unwrap();
        assert_eq!(loaded.interval_ms, 1000);
        assert_eq!(loaded.inner.name, "b");
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_file(".yaml", "inner:\n  rate: 19200\n");
        std::env::set_var("CL_TEST_ENV_INNER__RATE", "38400");
        let loaded = load_layered(&defaults(), Some(file.path()), "CL_TEST_ENV_").unwrap();
        std::env::remove_var("CL_TEST_ENV_INNER__RATE");
        assert_eq!(loaded.inner.rate, 38400);
    }

    #[test]
    fn test_bad_value_is_config_error() {
        let file = write_file(".yaml", "inner:\n  rate: fast\n");
        let err = load_layered(&defaults(), Some(file.path()), "CL_TEST_BAD_").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_and_unsupported_files() {
        let err = load_layered(
            &defaults(),
            Some(Path::new("/nonexistent/vfdmon.yaml")),
            "CL_TEST_MISSING_",
        )
        .unwrap_err();
        assert!(err.to_string().contains("not found"));

        let file = write_file(".ini", "rate=1\n");
        let err = load_layered(&defaults(), Some(file.path()), "CL_TEST_INI_").unwrap_err();
        assert!(err.to_string().contains("Unsupported"));
    }
}
