use serde::{Deserialize, Serialize};

use crate::function::DEFAULT_PORT;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logs: LogsConfig,
    #[serde(default)]
    pub mutations: MutationsConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    pub base_url: String,
    pub base_path: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LogsConfig {
    pub interval_ms: u64,
    pub script: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MutationsConfig {
    pub delete_reconciliation: DeleteReconciliation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DefaultsConfig {
    pub port: u16,
}

/// What to do with the local registry when an optimistic delete fails remotely.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeleteReconciliation {
    /// Keep the resource removed locally until the next full refresh.
    #[default]
    Keep,
    /// Re-list from the server right away.
    Refresh,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            logs: LogsConfig::default(),
            mutations: MutationsConfig::default(),
            defaults: DefaultsConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            base_path: "/v1/api".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            script: vec![
                "Log entry 1: Process started".to_string(),
                "Log entry 2: Performing operation".to_string(),
                "Log entry 3: Performing Saving data".to_string(),
            ],
        }
    }
}

impl Default for MutationsConfig {
    fn default() -> Self {
        Self {
            delete_reconciliation: DeleteReconciliation::Keep,
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

impl ApiConfig {
    /// Base URL joined with the API base path, without a trailing slash.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.base_path.trim_matches('/')
        )
        .trim_end_matches('/')
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_url_and_path() {
        let mut api = ApiConfig::default();
        assert_eq!(api.endpoint(), "http://localhost:8080/v1/api");

        api.base_url = "http://example.test/".to_string();
        api.base_path = "v1/api/".to_string();
        assert_eq!(api.endpoint(), "http://example.test/v1/api");

        api.base_path = String::new();
        assert_eq!(api.endpoint(), "http://example.test");
    }

    #[test]
    fn config_sections_are_optional() {
        let config: ConsoleConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ConsoleConfig::default());
        assert_eq!(config.mutations.delete_reconciliation, DeleteReconciliation::Keep);

        let config: ConsoleConfig =
            serde_json::from_str(r#"{"mutations":{"delete_reconciliation":"refresh"}}"#).unwrap();
        assert_eq!(config.mutations.delete_reconciliation, DeleteReconciliation::Refresh);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<ConsoleConfig, _> = serde_json::from_str(r#"{"apii":{}}"#);
        assert!(result.is_err());
    }
}
