use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_PORT: u16 = 8080;

/// A function definition as stored by the control plane.
///
/// `id` is a server-local sequence used only for newest-first ordering.
/// `external_id` is the stable key used in every REST path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResource {
    pub id: i64,
    pub external_id: String,
    pub name: String,
    pub configuration: FunctionConfiguration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionConfiguration {
    pub trigger: Trigger,
    pub image: RuntimeImage,
    #[serde(rename = "type")]
    pub kind: FunctionType,
    #[serde(default = "default_port", deserialize_with = "port_or_default")]
    pub port: u16,
    #[serde(
        rename = "envVars",
        default,
        deserialize_with = "env_vars_or_default"
    )]
    pub env_vars: BTreeMap<String, String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

// The platform stores the port as a nullable integer.
fn port_or_default<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u16>::deserialize(deserializer)?.unwrap_or(DEFAULT_PORT))
}

fn env_vars_or_default<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<BTreeMap<String, String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Error returned when a closed-set field is given a value outside its set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field} '{value}'")]
pub struct UnknownVariant {
    pub field: &'static str,
    pub value: String,
}

macro_rules! closed_set {
    ($name:ident, $field:literal, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($name::$variant),)+
                    _ => Err(UnknownVariant {
                        field: $field,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

closed_set!(Trigger, "trigger", {
    Http => "http",
    Cron => "cron",
});

closed_set!(RuntimeImage, "image", {
    Golang122 => "golang:1.22",
    OpenJdk17 => "openjdk:17-jdk",
    OpenJdk21 => "openjdk:21-jdk",
});

closed_set!(FunctionType, "type", {
    Rest => "REST",
    Single => "SINGLE",
});

/// Opaque function binary, uploaded once at creation time.
#[derive(Clone, PartialEq, Eq)]
pub struct Payload {
    pub file_name: String,
    pub bytes: Bytes,
}

impl Payload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Raw, unvalidated configuration input as typed into a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftConfiguration {
    pub trigger: String,
    pub image: String,
    pub kind: String,
    pub port: String,
    pub env_vars: BTreeMap<String, String>,
}

impl Default for DraftConfiguration {
    fn default() -> Self {
        Self {
            trigger: String::new(),
            image: String::new(),
            kind: String::new(),
            port: DEFAULT_PORT.to_string(),
            env_vars: BTreeMap::new(),
        }
    }
}

impl From<&FunctionConfiguration> for DraftConfiguration {
    fn from(config: &FunctionConfiguration) -> Self {
        Self {
            trigger: config.trigger.to_string(),
            image: config.image.to_string(),
            kind: config.kind.to_string(),
            port: config.port.to_string(),
            env_vars: config.env_vars.clone(),
        }
    }
}

/// Client-only state for a function that has not been submitted yet.
///
/// For the edit flow `external_id` names the resource being edited and
/// `payload` stays empty: the binary is immutable after creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftFunction {
    pub external_id: Option<String>,
    pub name: String,
    pub payload: Option<Payload>,
    pub config: DraftConfiguration,
}

impl DraftFunction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_resource(resource: &FunctionResource) -> Self {
        Self {
            external_id: Some(resource.external_id.clone()),
            name: resource.name.clone(),
            payload: None,
            config: DraftConfiguration::from(&resource.configuration),
        }
    }
}

/// A single edit to a draft, as produced by one input control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEdit {
    Name(String),
    Trigger(String),
    Image(String),
    Kind(String),
    Port(String),
    SetEnv { key: String, value: String },
    RemoveEnv(String),
}

impl FieldEdit {
    pub fn apply(self, draft: &mut DraftFunction) {
        match self {
            FieldEdit::Name(name) => draft.name = name,
            FieldEdit::Trigger(trigger) => draft.config.trigger = trigger,
            FieldEdit::Image(image) => draft.config.image = image,
            FieldEdit::Kind(kind) => draft.config.kind = kind,
            FieldEdit::Port(port) => draft.config.port = port,
            FieldEdit::SetEnv { key, value } => {
                draft.config.env_vars.insert(key, value);
            }
            FieldEdit::RemoveEnv(key) => {
                draft.config.env_vars.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_decodes_platform_shape() {
        let json = r#"{
            "id": 4,
            "external_id": "abc",
            "name": "hello",
            "state": "ACTIVE",
            "configuration": {
                "trigger": "http",
                "image": "golang:1.22",
                "type": "REST",
                "port": 8080,
                "envVars": {"A": "1"}
            },
            "created_at": "2024-04-01T10:00:00Z",
            "updated_at": "2024-04-01T10:00:00Z"
        }"#;

        let resource: FunctionResource = serde_json::from_str(json).unwrap();
        assert_eq!(resource.external_id, "abc");
        assert_eq!(resource.configuration.kind, FunctionType::Rest);
        assert_eq!(resource.configuration.image, RuntimeImage::Golang122);
        assert_eq!(resource.configuration.env_vars.get("A").map(String::as_str), Some("1"));
        assert!(resource.created_at.is_some());
    }

    #[test]
    fn null_port_and_env_fall_back_to_defaults() {
        let json = r#"{"trigger":"cron","image":"openjdk:21-jdk","type":"SINGLE","port":null,"envVars":null}"#;
        let config: FunctionConfiguration = serde_json::from_str(json).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.env_vars.is_empty());

        let json = r#"{"trigger":"cron","image":"openjdk:21-jdk","type":"SINGLE"}"#;
        let config: FunctionConfiguration = serde_json::from_str(json).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn configuration_serializes_wire_names() {
        let config = FunctionConfiguration {
            trigger: Trigger::Http,
            image: RuntimeImage::OpenJdk17,
            kind: FunctionType::Single,
            port: 9000,
            env_vars: BTreeMap::new(),
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["type"], "SINGLE");
        assert_eq!(value["image"], "openjdk:17-jdk");
        assert!(value.get("envVars").is_some());
    }

    #[test]
    fn closed_sets_parse_wire_values_only() {
        assert_eq!("cron".parse::<Trigger>().unwrap(), Trigger::Cron);
        assert_eq!("REST".parse::<FunctionType>().unwrap(), FunctionType::Rest);
        assert!("rest".parse::<FunctionType>().is_err());
        assert!("python:3.12".parse::<RuntimeImage>().is_err());
        assert_eq!(RuntimeImage::ALL.len(), 3);
    }

    #[test]
    fn field_edits_update_draft() {
        let mut draft = DraftFunction::new();
        FieldEdit::Name("hello".into()).apply(&mut draft);
        FieldEdit::SetEnv { key: "A".into(), value: "1".into() }.apply(&mut draft);
        FieldEdit::SetEnv { key: "A".into(), value: "2".into() }.apply(&mut draft);
        assert_eq!(draft.name, "hello");
        assert_eq!(draft.config.env_vars.len(), 1);
        assert_eq!(draft.config.port, "8080");

        FieldEdit::RemoveEnv("A".into()).apply(&mut draft);
        assert!(draft.config.env_vars.is_empty());
    }
}
