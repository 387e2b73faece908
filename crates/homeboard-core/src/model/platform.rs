// ── Platform domain types ──

use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::CoreError;

/// Vendor integration behind a platform row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlatformKind {
    SmartThings,
    Reolink,
    Konnected,
    Enlighten,
    Other(String),
}

impl PlatformKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::SmartThings => "smartthings",
            Self::Reolink => "reolink",
            Self::Konnected => "konnected",
            Self::Enlighten => "enlighten",
            Self::Other(s) => s,
        }
    }

    /// Human label used for default platform names.
    pub fn label(&self) -> &str {
        match self {
            Self::SmartThings => "SmartThings",
            Self::Reolink => "ReoLink",
            Self::Konnected => "Konnected",
            Self::Enlighten => "Enphase Enlighten",
            Self::Other(s) => s,
        }
    }

    /// The known kinds, in display order.
    pub fn known() -> [Self; 4] {
        [Self::SmartThings, Self::Reolink, Self::Konnected, Self::Enlighten]
    }
}

impl From<&str> for PlatformKind {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "smartthings" | "smart_things" => Self::SmartThings,
            "reolink" => Self::Reolink,
            "konnected" => Self::Konnected,
            "enlighten" | "enphase" => Self::Enlighten,
            _ => Self::Other(raw.to_owned()),
        }
    }
}

impl From<String> for PlatformKind {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl From<PlatformKind> for String {
    fn from(kind: PlatformKind) -> Self {
        kind.as_str().to_owned()
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A connected vendor account or integration.
#[derive(Debug, Clone, Serialize)]
pub struct Platform {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Display name. Not unique.
    pub name: String,
    pub kind: PlatformKind,
    /// Opaque credential blob; shape depends on `kind`.
    #[serde(skip_serializing)]
    pub credentials: Value,
    pub is_connected: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Platform {
    /// Decode the credential blob according to the platform kind.
    pub fn typed_credentials(&self) -> Result<PlatformCredentials, CoreError> {
        PlatformCredentials::decode(&self.kind, &self.credentials)
    }
}

// ── Typed credentials ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SmartThingsCredentials {
    pub token: SecretString,
}

#[derive(Debug, Clone)]
pub struct ReolinkCredentials {
    pub host: Option<String>,
    pub username: String,
    pub password: SecretString,
}

#[derive(Debug, Clone)]
pub struct KonnectedCredentials {
    /// Explicit panel address.
    pub host: Option<String>,
    /// Device YAML config pasted at connect time.
    pub config_yaml: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EnlightenCredentials {
    pub api_key: Option<SecretString>,
    pub system_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum PlatformCredentials {
    SmartThings(SmartThingsCredentials),
    Reolink(ReolinkCredentials),
    Konnected(KonnectedCredentials),
    Enlighten(EnlightenCredentials),
    Other(Value),
}

impl PlatformCredentials {
    pub fn decode(kind: &PlatformKind, blob: &Value) -> Result<Self, CoreError> {
        let missing = |field: &str| {
            CoreError::validation(format!("{} credentials missing '{field}'", kind.label()))
        };
        match kind {
            PlatformKind::SmartThings => {
                let token = first_str(blob, &["access_token", "token", "personal_access_token"])
                    .ok_or_else(|| missing("access_token"))?;
                Ok(Self::SmartThings(SmartThingsCredentials {
                    token: SecretString::from(token),
                }))
            }
            PlatformKind::Reolink => Ok(Self::Reolink(ReolinkCredentials {
                host: first_str(blob, &["ip_address", "host", "ip"]),
                username: first_str(blob, &["username", "user"]).unwrap_or_else(|| "admin".into()),
                password: SecretString::from(first_str(blob, &["password"]).unwrap_or_default()),
            })),
            PlatformKind::Konnected => Ok(Self::Konnected(KonnectedCredentials {
                host: first_str(blob, &["ip_address", "host", "ip"]),
                config_yaml: first_str(blob, &["config_yaml", "yaml_config", "device_config"]),
            })),
            PlatformKind::Enlighten => Ok(Self::Enlighten(EnlightenCredentials {
                api_key: first_str(blob, &["api_key"]).map(SecretString::from),
                system_id: first_str(blob, &["system_id"]),
            })),
            PlatformKind::Other(_) => Ok(Self::Other(blob.clone())),
        }
    }
}

/// First non-empty string value among the given keys.
fn first_str(blob: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| blob.get(*k))
        .find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}
