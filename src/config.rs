use anyhow::{bail, Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use jambda_models::ConsoleConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variables with this prefix override file settings.
/// Nested keys are separated by `__`, e.g. `JAMBDA_API__BASE_URL`.
pub const ENV_PREFIX: &str = "JAMBDA_";

const CONFIG_LOCATIONS: [&str; 2] = ["jambda.toml", "config/jambda.toml"];

/// Resolves which config file to read, if any.
pub fn config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    match explicit {
        Some(path) if path.is_file() => Ok(Some(path.to_path_buf())),
        Some(path) => bail!("config file {} does not exist", path.display()),
        None => Ok(CONFIG_LOCATIONS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.is_file())),
    }
}

/// Loads configuration: defaults, then the TOML file, then the environment.
pub fn load_config(explicit: Option<&Path>) -> Result<ConsoleConfig> {
    let mut figment = Figment::from(Serialized::defaults(ConsoleConfig::default()));

    if let Some(path) = config_file(explicit)? {
        debug!(path = %path.display(), "Reading console configuration");
        figment = figment.merge(Toml::file(path));
    }

    figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("invalid console configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use jambda_models::DeleteReconciliation;

    #[test]
    fn defaults_without_file_or_env() {
        Jail::expect_with(|_jail| {
            let config = load_config(None).map_err(|e| e.to_string())?;
            assert_eq!(config, ConsoleConfig::default());
            assert_eq!(config.api.endpoint(), "http://localhost:8080/v1/api");
            Ok(())
        });
    }

    #[test]
    fn file_then_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "jambda.toml",
                r#"
                [api]
                base_url = "http://control.internal:9000"

                [mutations]
                delete_reconciliation = "refresh"
                "#,
            )?;
            jail.set_env("JAMBDA_API__TIMEOUT_MS", "2500");
            jail.set_env("JAMBDA_DEFAULTS__PORT", "9090");

            let config = load_config(None).map_err(|e| e.to_string())?;
            assert_eq!(config.api.base_url, "http://control.internal:9000");
            assert_eq!(config.api.base_path, "/v1/api");
            assert_eq!(config.api.timeout_ms, 2500);
            assert_eq!(config.defaults.port, 9090);
            assert_eq!(
                config.mutations.delete_reconciliation,
                DeleteReconciliation::Refresh
            );
            assert_eq!(config.logs.script.len(), 3);
            Ok(())
        });
    }

    #[test]
    fn nested_default_location_is_found() {
        Jail::expect_with(|jail| {
            std::fs::create_dir("config").map_err(|e| e.to_string())?;
            jail.create_file("config/jambda.toml", "[logs]\ninterval_ms = 10\n")?;

            let config = load_config(None).map_err(|e| e.to_string())?;
            assert_eq!(config.logs.interval_ms, 10);
            Ok(())
        });
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        Jail::expect_with(|_jail| {
            assert!(load_config(Some(Path::new("nope.toml"))).is_err());
            Ok(())
        });
    }

    #[test]
    fn unknown_keys_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "[api]\nbase_uri = \"typo\"\n")?;
            assert!(load_config(Some(Path::new("custom.toml"))).is_err());
            Ok(())
        });
    }
}
