//! Shared value types

use schemars::JsonSchema;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Written in place of a password when a config is serialized
const REDACTED: &str = "***REDACTED***";

/// Password for the trace cluster or InfluxDB.
///
/// Read from config as plain text; `Debug` and serialization never show it,
/// so `validate` output and logged configs stay clean. Only the store clients
/// call [`SensitiveString::expose_secret`].
#[derive(Clone)]
pub struct SensitiveString(SecretString);

impl SensitiveString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::new(value.into().into_boxed_str()))
    }

    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for SensitiveString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(REDACTED)
    }
}

impl Serialize for SensitiveString {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

impl<'de> Deserialize<'de> for SensitiveString {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

impl JsonSchema for SensitiveString {
    fn schema_name() -> String {
        "Password".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        let mut schema = gen.subschema_for::<String>();
        if let schemars::schema::Schema::Object(obj) = &mut schema {
            obj.format = Some("password".to_string());
            obj.metadata().description = Some(
                "Store password; supports ${VAR} expansion and is never echoed back".to_string(),
            );
        }
        schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SensitiveString::new("influx-pass");
        assert_eq!(format!("{:?}", secret), "***REDACTED***");
        assert_eq!(format!("{:?}", Some(secret.clone())), "Some(***REDACTED***)");
        assert_eq!(secret.expose_secret(), "influx-pass");
    }

    #[test]
    fn test_serde() {
        let secret: SensitiveString = serde_yaml::from_str("cassandra").unwrap();
        assert_eq!(secret.expose_secret(), "cassandra");

        let json = serde_json::to_string(&secret).unwrap();
        assert_eq!(json, "\"***REDACTED***\"");
    }

    #[test]
    fn test_schema_format() {
        let schema = serde_json::to_value(schemars::schema_for!(SensitiveString)).unwrap();
        assert_eq!(schema["format"], "password");
    }
}
